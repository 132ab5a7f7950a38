use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{CategoryDirectory, CategoryRecord};
use crate::error::{Error, ErrorDetails};

/// Column names accepted in the header row. The second name of each pair is the header
/// used by spreadsheet exports of the category sheet.
const ID_COLUMNS: &[&str] = &["id", "IDCategorie"];
const NAME_COLUMNS: &[&str] = &["name", "NomCategorie"];
const STORE_ID_COLUMNS: &[&str] = &["store_id", "SheetID"];
const ENDPOINT_COLUMNS: &[&str] = &["endpoint", "ScriptURL"];
const IMAGE_COLUMNS: &[&str] = &["image_url", "ImageURL"];
const PHONE_COLUMNS: &[&str] = &["phone", "Numero"];

/// A category directory stored as a tab-separated file with a header row.
#[derive(Debug)]
pub struct TabularFileDirectory {
    path: PathBuf,
    placeholder_prefix: String,
    default_image_url: String,
}

impl TabularFileDirectory {
    pub fn new(path: PathBuf, placeholder_prefix: String, default_image_url: String) -> Self {
        Self {
            path,
            placeholder_prefix,
            default_image_url,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_contents(&self) -> Result<String, Error> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::new(ErrorDetails::StoreUnavailable {
                message: format!("Failed to read `{}`: {e}", self.path.display()),
            })
        })
    }
}

#[async_trait]
impl CategoryDirectory for TabularFileDirectory {
    async fn read_all(&self) -> Result<Vec<CategoryRecord>, Error> {
        let contents = self.read_contents().await?;
        parse_directory(&contents, &self.placeholder_prefix, &self.default_image_url)
    }

    async fn fingerprint(&self) -> Result<Option<blake3::Hash>, Error> {
        let contents = self.read_contents().await?;
        Ok(Some(blake3::hash(contents.as_bytes())))
    }

    fn describe(&self) -> String {
        format!("file `{}`", self.path.display())
    }
}

struct HeaderLayout {
    id: usize,
    name: usize,
    store_id: Option<usize>,
    endpoint: usize,
    image_url: Option<usize>,
    phone: Option<usize>,
}

impl HeaderLayout {
    fn parse(header: &str) -> Result<Self, Error> {
        let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |aliases: &[&str]| {
            columns.iter().position(|column| {
                aliases
                    .iter()
                    .any(|alias| column.eq_ignore_ascii_case(alias))
            })
        };
        let require = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| {
                Error::new(ErrorDetails::StoreUnavailable {
                    message: format!(
                        "Header row is missing required column `{}`",
                        aliases.first().copied().unwrap_or_default()
                    ),
                })
            })
        };
        Ok(Self {
            id: require(ID_COLUMNS)?,
            name: require(NAME_COLUMNS)?,
            store_id: find(STORE_ID_COLUMNS),
            endpoint: require(ENDPOINT_COLUMNS)?,
            image_url: find(IMAGE_COLUMNS),
            phone: find(PHONE_COLUMNS),
        })
    }
}

/// Parses the tab-separated directory format.
///
/// The first non-blank line is the header. Blank lines are skipped and short rows are padded
/// with empty cells, so a row with a trailing empty column still parses.
pub fn parse_directory(
    contents: &str,
    placeholder_prefix: &str,
    default_image_url: &str,
) -> Result<Vec<CategoryRecord>, Error> {
    let mut lines = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());
    let header = lines.next().ok_or_else(|| {
        Error::new(ErrorDetails::StoreUnavailable {
            message: "Directory has no header row".to_string(),
        })
    })?;
    let layout = HeaderLayout::parse(header)?;

    let records = lines
        .map(|line| {
            let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
            let cell = |index: usize| cells.get(index).copied().unwrap_or_default().to_string();
            let optional_cell = |index: Option<usize>| index.map(cell).unwrap_or_default();
            let image_url = optional_cell(layout.image_url);
            CategoryRecord {
                id: cell(layout.id),
                name: cell(layout.name),
                store_id: optional_cell(layout.store_id),
                endpoint: cell(layout.endpoint),
                image_url: if image_url.is_empty() {
                    default_image_url.to_string()
                } else {
                    image_url
                },
                phone: optional_cell(layout.phone),
                active: false,
            }
            .resolve_active(placeholder_prefix)
        })
        .collect();
    Ok(records)
}
