use std::collections::HashMap;
use std::path::Path;

use crate::error::CatalogError;

/// Header names accepted for the alpha-2 code column (compared lowercase).
const CODE_HEADERS: &[&str] = &["alpha-2 code", "alpha-2", "alpha2", "code"];

/// Header names accepted for the English name column (compared lowercase).
const NAME_HEADERS: &[&str] = &[
    "english short name lower case",
    "english short name",
    "name",
    "country",
];

/// Country code to English name lookup.
#[derive(Debug, Clone, Default)]
pub struct CountryCrosswalk {
    names: HashMap<String, String>,
}

impl CountryCrosswalk {
    /// Load the crosswalk from a CSV file with a header row.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, lacks a code or name
    /// column, or has no rows.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let malformed = |message: String| CatalogError::MalformedCrosswalk {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| match e.into_kind() {
                csv::ErrorKind::Io(source) => CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                },
                other => malformed(format!("{:?}", other)),
            })?;

        let headers = reader.headers().map_err(|e| malformed(e.to_string()))?.clone();
        let code_col = find_column(&headers, CODE_HEADERS)
            .ok_or_else(|| malformed("no alpha-2 code column".to_string()))?;
        let name_col = find_column(&headers, NAME_HEADERS)
            .ok_or_else(|| malformed("no English name column".to_string()))?;

        let mut pairs = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| malformed(e.to_string()))?;
            let code = record.get(code_col).unwrap_or_default();
            let name = record.get(name_col).unwrap_or_default();

            if code.is_empty() || name.is_empty() {
                tracing::debug!("Skipping crosswalk row {} with empty fields", line + 2);
                continue;
            }
            pairs.push((code.to_string(), name.to_string()));
        }

        if pairs.is_empty() {
            return Err(malformed("no rows".to_string()));
        }

        let crosswalk = Self::from_pairs(pairs);
        tracing::info!(
            "Loaded {} country names from {}",
            crosswalk.len(),
            path.display()
        );
        Ok(crosswalk)
    }

    /// Build a crosswalk from (code, name) pairs. The first name for a code wins.
    pub fn from_pairs<I, C, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        let mut names = HashMap::new();
        for (code, name) in pairs {
            let code = code.into().to_ascii_uppercase();
            if names.contains_key(&code) {
                tracing::warn!("Duplicate country code '{}' in crosswalk, keeping first", code);
                continue;
            }
            names.insert(code, name.into());
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// English name for a two-letter code.
    ///
    /// # Errors
    /// Returns `UnknownCountry` when the code has no row.
    pub fn lookup(&self, code: &str) -> Result<&str, CatalogError> {
        self.names
            .get(&code.trim().to_ascii_uppercase())
            .map(String::as_str)
            .ok_or_else(|| CatalogError::UnknownCountry(code.to_string()))
    }
}

fn find_column(headers: &csv::StringRecord, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|candidate| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(candidate))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_iso_style_csv() {
        let file = write_csv(
            "English short name lower case,Alpha-2 code,Alpha-3 code,Numeric code,ISO 3166-2\n\
             United States,US,USA,840,ISO 3166-2:US\n\
             \"Korea, Republic of\",KR,KOR,410,ISO 3166-2:KR\n",
        );

        let crosswalk = CountryCrosswalk::load(file.path()).unwrap();

        assert_eq!(crosswalk.len(), 2);
        assert_eq!(crosswalk.lookup("US").unwrap(), "United States");
        assert_eq!(crosswalk.lookup("KR").unwrap(), "Korea, Republic of");
    }

    #[test]
    fn test_load_name_code_csv() {
        let file = write_csv("Name,Code\nFrance,FR\nJapan,JP\n");

        let crosswalk = CountryCrosswalk::load(file.path()).unwrap();
        assert_eq!(crosswalk.lookup("JP").unwrap(), "Japan");
    }

    #[test]
    fn test_lookup_is_exact_after_normalising_case() {
        let crosswalk = CountryCrosswalk::from_pairs([("US", "United States")]);

        assert_eq!(crosswalk.lookup("us").unwrap(), "United States");
        assert!(crosswalk.lookup("U").is_err());
        assert!(crosswalk.lookup("USA").is_err());
    }

    #[test]
    fn test_lookup_missing_code_is_error() {
        let crosswalk = CountryCrosswalk::from_pairs([("US", "United States")]);

        let err = crosswalk.lookup("ZZ").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownCountry(code) if code == "ZZ"));
    }

    #[test]
    fn test_every_loaded_code_resolves_to_one_name() {
        let pairs = [("US", "United States"), ("FR", "France"), ("JP", "Japan")];
        let crosswalk = CountryCrosswalk::from_pairs(pairs);

        for (code, name) in pairs {
            assert_eq!(crosswalk.lookup(code).unwrap(), name);
        }
    }

    #[test]
    fn test_duplicate_code_keeps_first() {
        let crosswalk = CountryCrosswalk::from_pairs([("US", "United States"), ("US", "USA")]);
        assert_eq!(crosswalk.lookup("US").unwrap(), "United States");
    }

    #[test]
    fn test_missing_columns() {
        let file = write_csv("Country,Population\nFrance,68000000\n");
        let err = CountryCrosswalk::load(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedCrosswalk { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = CountryCrosswalk::load(Path::new("/nonexistent/countries.csv")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_header_only_is_malformed() {
        let file = write_csv("Name,Code\n");
        let err = CountryCrosswalk::load(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedCrosswalk { .. }));
    }
}
