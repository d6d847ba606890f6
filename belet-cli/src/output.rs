use anyhow::Result;
use belet_api::models::{
    CatalogItem, Episode, HomepageSection, MediaFile, MovieInfo, SearchFilters, SearchResult,
};
use colored::*;
use serde_json::{Value, json};

use crate::cli::OutputFormat;

pub struct OutputManager {
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn print_json(&self, value: &Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn item(&self, item: &CatalogItem) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&item_json(item)),
            OutputFormat::Pretty => {
                print_info(item.info());
                match item {
                    CatalogItem::Movie(movie) => {
                        if let Some(files) = movie.files.get() {
                            println!("{}", "Files:".green().bold());
                            print_files(files, "  ");
                        }
                    }
                    CatalogItem::Series(series) => {
                        println!("{}", "Seasons:".green().bold());
                        for season in &series.seasons {
                            println!("  {} {}", format!("[{}]", season.id).yellow(), season.name);
                            if let Some(episodes) = season.episodes.get() {
                                print_episodes(episodes);
                            }
                        }
                    }
                }
                Ok(())
            }
        }
    }

    pub fn sections(&self, sections: &[HomepageSection]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&serde_json::to_value(sections)?),
            OutputFormat::Pretty => {
                for section in sections {
                    let title = if section.title_tk.is_empty() {
                        &section.title_ru
                    } else {
                        &section.title_tk
                    };
                    println!(
                        "{} {}",
                        title.green().bold(),
                        format!("({:?}, {} items)", section.section_type, section.movies.len())
                            .dimmed()
                    );
                    for movie in &section.movies {
                        println!("  {}", summary(movie));
                    }
                }
                Ok(())
            }
        }
    }

    pub fn search(&self, result: &SearchResult) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&serde_json::to_value(result)?),
            OutputFormat::Pretty => {
                if result.movies.is_empty() {
                    println!("{}", "Nothing found".yellow());
                }
                for movie in &result.movies {
                    println!("{}", summary(movie));
                }
                Ok(())
            }
        }
    }

    pub fn filters(&self, filters: &SearchFilters) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print_json(&serde_json::to_value(filters)?),
            OutputFormat::Pretty => {
                for filter in &filters.filters {
                    println!(
                        "{} {}",
                        filter.name.green().bold(),
                        format!("(-f {}=<id>)", filter.query_name).dimmed()
                    );
                    for value in &filter.data {
                        println!("  {:>6}  {}", value.id.to_string().yellow(), value.name);
                    }
                }
                match &filters.sort {
                    Some(sort) => {
                        println!(
                            "{} {}",
                            sort.name.green().bold(),
                            format!("(--sort {}=<id>)", sort.name_param).dimmed()
                        );
                        for value in &sort.data {
                            println!("  {:>12}  {}", value.id.yellow(), value.name);
                        }
                    }
                    None => println!("{}", "Results cannot be sorted".dimmed()),
                }
                Ok(())
            }
        }
    }
}

fn summary(movie: &MovieInfo) -> String {
    let year = movie.year.map(|y| format!(" ({y})")).unwrap_or_default();
    format!(
        "{} {}{} {}",
        format!("[{}]", movie.id).yellow(),
        movie.name.cyan(),
        year,
        movie.category.to_string().dimmed()
    )
}

fn print_info(info: &MovieInfo) {
    println!("{}", summary(info));
    if let Some(duration) = &info.duration {
        println!("{} {}", "Duration:".green(), duration);
    }
    if !info.genres.is_empty() {
        println!("{} {}", "Genres:".green(), info.genres.join(", "));
    }
    if !info.countries.is_empty() {
        println!("{} {}", "Countries:".green(), info.countries.join(", "));
    }
    if let Some(imdb) = info.rating_imdb {
        println!("{} {imdb:.1}", "IMDb:".green());
    }
    if let Some(description) = info.description.as_deref().filter(|d| !d.is_empty()) {
        println!("{}", description.trim());
    }
}

fn print_files(files: &[MediaFile], indent: &str) {
    for file in files {
        match file.label() {
            Some(label) => println!("{indent}{} {}", label.yellow(), file.filename.blue()),
            None => println!("{indent}{}", file.filename.blue()),
        }
    }
}

fn print_episodes(episodes: &[Episode]) {
    for episode in episodes {
        println!("    {} {}", format!("[{}]", episode.id).yellow(), episode.name);
        print_files(&episode.files, "      ");
    }
}

fn item_json(item: &CatalogItem) -> Value {
    match item {
        CatalogItem::Movie(movie) => json!({
            "kind": "movie",
            "info": movie.info,
            "files": movie.files.get(),
        }),
        CatalogItem::Series(series) => json!({
            "kind": "series",
            "info": series.info,
            "seasons": series.seasons.iter().map(|season| json!({
                "id": season.id,
                "name": season.name,
                "episodes": season.episodes.get(),
            })).collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use belet_api::models::{Loadable, Movie, Season, Series};

    #[test]
    fn item_json_marks_unloaded_parts_as_null() {
        let movie = CatalogItem::Movie(Movie {
            info: MovieInfo {
                id: 1,
                name: "A".into(),
                ..MovieInfo::default()
            },
            files: Loadable::NotLoaded,
        });
        let value = item_json(&movie);
        assert_eq!(value["kind"], "movie");
        assert!(value["files"].is_null());

        let series = CatalogItem::Series(Series {
            info: MovieInfo::default(),
            seasons: vec![Season::new(5, "S1")],
        });
        let value = item_json(&series);
        assert_eq!(value["seasons"][0]["id"], 5);
        assert!(value["seasons"][0]["episodes"].is_null());
    }
}
