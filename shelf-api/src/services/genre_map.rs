//! Fine-grained → coarse genre table served alongside the audiobook catalog

use serde_json::{Map, Value};

/// Sub-genre → display genre
pub const GENRE_MAP: &[(&str, &str)] = &[
    ("Supernatural Thriller", "Thriller"),
    ("Psychological Thriller", "Thriller"),
    ("Road/Survival Horror", "Horror"),
    ("Ghost in the Machine", "Sci-Fi"),
    ("Private Investigator", "Thriller"),
    ("Paranormal Mystery", "Paranormal Mystery"),
    ("Paranormal Romance", "Romance"),
    ("Urban Fantasy", "Urban Fantasy"),
    ("Drama and Romance", "Romance"),
    ("Magical Realism", "Contemporary Fiction"),
    ("Western", "Historical Fiction"),
    ("Adventure", "Adventure"),
    ("Portal Fantasy", "Fantasy"),
    ("Epic Fantasy", "Fantasy"),
    ("Fairy Tale", "Fantasy"),
    ("Romantasy", "Fantasy"),
    ("Fantasy Romance", "Fantasy"),
    ("Space Opera", "Sci-Fi"),
];

/// The table as a JSON object, in table order
pub fn genre_map_json() -> Map<String, Value> {
    GENRE_MAP
        .iter()
        .map(|(fine, coarse)| (fine.to_string(), Value::String(coarse.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keeps_every_entry_in_order() {
        let map = genre_map_json();
        assert_eq!(map.len(), GENRE_MAP.len());
        assert_eq!(map.keys().next().map(String::as_str), Some("Supernatural Thriller"));
        assert_eq!(map["Romantasy"], "Fantasy");
    }
}
