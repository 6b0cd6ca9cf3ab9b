//! Domain types shared by the ingestion, retrieval and generation layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Error;

pub type ParentId = String;
pub type ChunkId = String;

/// Shared handle to a child chunk. Retrievers hand these out so a ranked
/// list never copies chunk text.
pub type ChunkRef = Arc<ChildChunk>;

/// Dish category, inferred from the directory a recipe lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "荤菜", alias = "meat_dish")]
    MeatDish,
    #[serde(rename = "素菜", alias = "vegetable_dish")]
    VegetableDish,
    #[serde(rename = "汤品", alias = "soup")]
    Soup,
    #[serde(rename = "甜品", alias = "dessert")]
    Dessert,
    #[serde(rename = "早餐", alias = "breakfast")]
    Breakfast,
    #[serde(rename = "主食", alias = "staple")]
    Staple,
    #[serde(rename = "水产", alias = "aquatic")]
    Aquatic,
    #[serde(rename = "调料", alias = "condiment")]
    Condiment,
    #[serde(rename = "饮品", alias = "drink")]
    Drink,
    #[serde(rename = "其他", alias = "other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::MeatDish,
        Category::VegetableDish,
        Category::Soup,
        Category::Dessert,
        Category::Breakfast,
        Category::Staple,
        Category::Aquatic,
        Category::Condiment,
        Category::Drink,
        Category::Other,
    ];

    /// Categories a user can ask for. `Other` is only a fallback.
    pub fn supported() -> &'static [Category] {
        &Self::ALL[..9]
    }

    /// Directory name used by the corpus layout.
    pub fn key(self) -> &'static str {
        match self {
            Category::MeatDish => "meat_dish",
            Category::VegetableDish => "vegetable_dish",
            Category::Soup => "soup",
            Category::Dessert => "dessert",
            Category::Breakfast => "breakfast",
            Category::Staple => "staple",
            Category::Aquatic => "aquatic",
            Category::Condiment => "condiment",
            Category::Drink => "drink",
            Category::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::MeatDish => "荤菜",
            Category::VegetableDish => "素菜",
            Category::Soup => "汤品",
            Category::Dessert => "甜品",
            Category::Breakfast => "早餐",
            Category::Staple => "主食",
            Category::Aquatic => "水产",
            Category::Condiment => "调料",
            Category::Drink => "饮品",
            Category::Other => "其他",
        }
    }

    /// First path component naming a known category wins; anything else is `Other`.
    pub fn from_path(path: &Path) -> Self {
        path.components()
            .filter_map(|c| c.as_os_str().to_str())
            .find_map(|part| Self::supported().iter().copied().find(|c| c.key() == part))
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label() == s || c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedLabel { kind: "category", label: s.to_string() })
    }
}

/// Difficulty derived from the star rating in a recipe. Ordered from
/// `Unknown` (no rating) through `VeryHard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "未知", alias = "unknown")]
    Unknown,
    #[serde(rename = "非常简单", alias = "very_easy")]
    VeryEasy,
    #[serde(rename = "简单", alias = "easy")]
    Easy,
    #[serde(rename = "中等", alias = "medium")]
    Medium,
    #[serde(rename = "困难", alias = "hard")]
    Hard,
    #[serde(rename = "非常困难", alias = "very_hard")]
    VeryHard,
}

pub const STAR: char = '★';

impl Difficulty {
    pub const ALL: [Difficulty; 6] = [
        Difficulty::Unknown,
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
    ];

    pub fn supported() -> &'static [Difficulty] {
        &Self::ALL[1..]
    }

    pub fn key(self) -> &'static str {
        match self {
            Difficulty::Unknown => "unknown",
            Difficulty::VeryEasy => "very_easy",
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::VeryHard => "very_hard",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Unknown => "未知",
            Difficulty::VeryEasy => "非常简单",
            Difficulty::Easy => "简单",
            Difficulty::Medium => "中等",
            Difficulty::Hard => "困难",
            Difficulty::VeryHard => "非常困难",
        }
    }

    pub fn from_stars(stars: usize) -> Self {
        match stars {
            0 => Difficulty::Unknown,
            1 => Difficulty::VeryEasy,
            2 => Difficulty::Easy,
            3 => Difficulty::Medium,
            4 => Difficulty::Hard,
            _ => Difficulty::VeryHard,
        }
    }

    /// Rates a recipe by the longest run of `★` in its text.
    pub fn from_text(text: &str) -> Self {
        let mut longest = 0usize;
        let mut run = 0usize;
        for c in text.chars() {
            if c == STAR {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        Self::from_stars(longest)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.label() == s || d.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedLabel { kind: "difficulty", label: s.to_string() })
    }
}

/// Fixed metadata schema carried by parents and copied onto every child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Path the document was read from, as given to the loader.
    pub source: String,
    /// Path relative to the corpus root, `/`-separated. Parent identity derives from it.
    pub relative_path: String,
    pub category: Category,
    pub dish_name: String,
    pub difficulty: Difficulty,
}

/// One complete recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentDocument {
    pub parent_id: ParentId,
    pub content: String,
    pub metadata: DocMetadata,
}

/// Markdown headers enclosing a chunk (`#` and `##`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderPath {
    pub h1: Option<String>,
    pub h2: Option<String>,
}

impl HeaderPath {
    /// Entering a header resets every deeper level.
    pub fn enter(&mut self, level: usize, title: &str) {
        match level {
            1 => {
                self.h1 = Some(title.to_string());
                self.h2 = None;
            }
            2 => self.h2 = Some(title.to_string()),
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.h1.is_none() && self.h2.is_none()
    }
}

impl fmt::Display for HeaderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.h1, &self.h2) {
            (Some(a), Some(b)) => write!(f, "{a} > {b}"),
            (Some(a), None) => f.write_str(a),
            (None, Some(b)) => f.write_str(b),
            (None, None) => Ok(()),
        }
    }
}

/// A section produced by a structural splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub headers: HeaderPath,
    pub text: String,
}

/// A header-delimited slice of exactly one parent.
///
/// - `chunk_id`: fresh per ingestion pass; equals `parent_id` for a pseudo-chunk
/// - `chunk_index`: position within the parent
/// - `batch_index`: position within the global chunk sequence
/// - `chunk_size`: length of `content` in characters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildChunk {
    pub chunk_id: ChunkId,
    pub parent_id: ParentId,
    pub chunk_index: usize,
    pub batch_index: usize,
    pub content: String,
    pub headers: HeaderPath,
    pub metadata: DocMetadata,
    pub chunk_size: usize,
}

impl ChildChunk {
    /// True when the parent had no splittable structure and stands in as its own chunk.
    pub fn is_pseudo(&self) -> bool {
        self.chunk_id == self.parent_id
    }

    /// Value of a metadata field, or `None` when the chunk does not carry it.
    /// Category and difficulty are reported by label.
    pub fn field(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::Category => Some(self.metadata.category.label()),
            MetadataField::Difficulty => Some(self.metadata.difficulty.label()),
            MetadataField::DishName => Some(self.metadata.dish_name.as_str()),
            MetadataField::Source => Some(self.metadata.source.as_str()),
            MetadataField::Header1 => self.headers.h1.as_deref(),
            MetadataField::Header2 => self.headers.h2.as_deref(),
        }
    }
}

/// Fields a metadata filter may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Category,
    DishName,
    Difficulty,
    Source,
    #[serde(rename = "h1")]
    Header1,
    #[serde(rename = "h2")]
    Header2,
}

impl MetadataField {
    pub fn name(self) -> &'static str {
        match self {
            MetadataField::Category => "category",
            MetadataField::DishName => "dish_name",
            MetadataField::Difficulty => "difficulty",
            MetadataField::Source => "source",
            MetadataField::Header1 => "h1",
            MetadataField::Header2 => "h2",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetadataField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "category" => Ok(MetadataField::Category),
            "dish_name" => Ok(MetadataField::DishName),
            "difficulty" => Ok(MetadataField::Difficulty),
            "source" => Ok(MetadataField::Source),
            "h1" | "主标题" => Ok(MetadataField::Header1),
            "h2" | "二级标题" => Ok(MetadataField::Header2),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}

/// Query intent, which picks the generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    List,
    Detail,
    Basic,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::List => "list",
            Route::Detail => "detail",
            Route::Basic => "basic",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Route::List),
            "detail" => Ok(Route::Detail),
            "basic" => Ok(Route::Basic),
            other => Err(Error::UnsupportedLabel { kind: "route", label: other.to_string() }),
        }
    }
}
