mod common;

use belet_api::{Error, FfmpegConfig};
use common::{can_bind_localhost, client, config, film, jwt, session_with_token};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use reqwest::StatusCode;
use serde_json::{Value, json};

const FAR_FUTURE: i64 = 4_102_444_800;

#[tokio::test]
async fn unauthorized_request_is_refreshed_and_retried_once() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));
    let (old, new) = (jwt(1_000, "old"), jwt(FAR_FUTURE, "new"));

    let stale = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/movie/42")
                .header("authorization", old.as_str());
            then.status(401);
        })
        .await;
    let fresh = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v2/movie/42")
                .header("authorization", new.as_str());
            then.status(200).json_body(film(42, Value::Null));
        })
        .await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200).json_body(json!({ "token": new }));
        })
        .await;

    let session = session_with_token(&config, Some(old.as_str()));
    let client = client(session.clone(), FfmpegConfig::default());

    let item = client.get_catalog_item("42").await.unwrap();
    assert_eq!(item.id(), 42);

    stale.assert_hits_async(1).await;
    refresh.assert_hits_async(1).await;
    fresh.assert_hits_async(1).await;

    assert_eq!(session.token().unwrap().as_str(), new);
    let stored = session.store().load().await.unwrap().unwrap();
    assert_eq!(stored.token.unwrap().as_str(), new);
}

#[tokio::test]
async fn second_unauthorized_is_returned_without_another_refresh() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));

    let movie = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/movie/7");
            then.status(401);
        })
        .await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200)
                .json_body(json!({ "token": jwt(FAR_FUTURE, "next") }));
        })
        .await;

    let session = session_with_token(&config, Some(jwt(1_000, "old").as_str()));
    let client = client(session, FfmpegConfig::default());

    let err = client.get_catalog_item("7").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(matches!(err, Error::HttpStatus { .. }));

    movie.assert_hits_async(2).await;
    refresh.assert_hits_async(1).await;
}

#[tokio::test]
async fn rejected_refresh_is_unauthorized() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));

    let movie = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/movie/7");
            then.status(401);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(401).json_body(json!({ "msg": "Session expired" }));
        })
        .await;

    let session = session_with_token(&config, None);
    let client = client(session, FfmpegConfig::default());

    match client.get_catalog_item("7").await {
        Err(err @ Error::Unauthorized { .. }) => {
            assert!(err.requires_relogin());
            assert!(err.to_string().ends_with("Session expired"), "{err}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    movie.assert_hits_async(1).await;
}

#[tokio::test]
async fn other_failures_are_not_retried() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));

    let movie = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v2/movie/9");
            then.status(503);
        })
        .await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200)
                .json_body(json!({ "token": jwt(FAR_FUTURE, "next") }));
        })
        .await;

    let session = session_with_token(&config, Some(jwt(FAR_FUTURE, "t").as_str()));
    let client = client(session, FfmpegConfig::default());

    let err = client.get_catalog_item("9").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    movie.assert_hits_async(1).await;
    refresh.assert_hits_async(0).await;
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));
    let (old, new) = (jwt(1_000, "old"), jwt(FAR_FUTURE, "new"));

    for id in [1, 2] {
        let path = format!("/api/v2/movie/{id}");
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(path.as_str())
                    .header("authorization", old.as_str());
                then.status(401);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(path.as_str())
                    .header("authorization", new.as_str());
                then.status(200).json_body(film(id, Value::Null));
            })
            .await;
    }
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200)
                .delay(std::time::Duration::from_millis(100))
                .json_body(json!({ "token": new }));
        })
        .await;

    let session = session_with_token(&config, Some(old.as_str()));
    let client = client(session, FfmpegConfig::default());

    let (a, b) = tokio::join!(client.get_catalog_item("1"), client.get_catalog_item("2"));
    assert_eq!(a.unwrap().id(), 1);
    assert_eq!(b.unwrap().id(), 2);
    refresh.assert_hits_async(1).await;
}

#[tokio::test]
async fn pre_emptive_refresh_only_when_expired() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200)
                .json_body(json!({ "token": jwt(FAR_FUTURE, "next") }));
        })
        .await;

    let session = session_with_token(&config, Some(jwt(FAR_FUTURE, "valid").as_str()));
    assert!(!session.refresh_if_expired().await.unwrap());
    refresh.assert_hits_async(0).await;

    session.set_token(Some(belet_api::credentials::Token::new(jwt(1_000, "old")).unwrap()));
    assert!(session.refresh_if_expired().await.unwrap());
    refresh.assert_hits_async(1).await;
    assert!(!session.is_token_expired().unwrap());
}

#[tokio::test]
async fn oversized_refresh_token_leaves_session_untouched() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, &dir.path().join("creds.bin"));
    let huge = jwt(FAR_FUTURE, &"x".repeat(300));
    assert!(huge.len() > 255);
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200).json_body(json!({ "token": huge }));
        })
        .await;

    let old = jwt(1_000, "old");
    let session = session_with_token(&config, Some(old.as_str()));

    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err:?}");
    assert_eq!(session.token().unwrap().as_str(), old);
    assert!(!config.data_file.exists());
}

#[tokio::test]
async fn failed_persist_keeps_previous_token() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    // A directory in place of the credential file makes every save fail.
    let data_file = dir.path().join("creds.bin");
    std::fs::create_dir(&data_file).unwrap();
    let config = config(&server, &data_file);
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/v1/auth/refresh");
            then.status(200)
                .json_body(json!({ "token": jwt(FAR_FUTURE, "new") }));
        })
        .await;

    let old = jwt(1_000, "old");
    let session = session_with_token(&config, Some(old.as_str()));

    let err = session.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err:?}");
    assert_eq!(session.token().unwrap().as_str(), old);
}
