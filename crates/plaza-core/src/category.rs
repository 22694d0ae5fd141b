//! Non-post content shown in the feed's carousels: events, places,
//! opportunities, products and shops, plus the ad spots of a place or shop.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Events,
    Places,
    Opportunities,
    Products,
    Shops,
}

/// Order in which carousels cycle through the feed.
pub const CATEGORY_CYCLE: [Category; 5] = [
    Category::Events,
    Category::Places,
    Category::Opportunities,
    Category::Products,
    Category::Shops,
];

impl Category {
    /// Path segment of the list endpoint, `/api/{segment}/get`.
    pub fn segment(&self) -> &'static str {
        match self {
            Category::Events => "events",
            Category::Places => "places",
            Category::Opportunities => "opportunities",
            Category::Products => "products",
            Category::Shops => "shops",
        }
    }

    /// Key holding the item array in the list response.
    pub fn response_key(&self) -> &'static str {
        self.segment()
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::Events => "Events",
            Category::Places => "Places",
            Category::Opportunities => "Opportunities",
            Category::Products => "Products",
            Category::Shops => "Shops",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segment())
    }
}

/// Restricts a list to the items of one place or shop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Place(String),
    Shop(String),
}

impl Scope {
    /// Extra query parameter for scoped endpoints.
    pub fn query_param(&self) -> Option<(&'static str, &str)> {
        match self {
            Scope::Global => None,
            Scope::Place(id) => Some(("placeId", id.as_str())),
            Scope::Shop(id) => Some(("shopId", id.as_str())),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Place(id) => write!(f, "place:{id}"),
            Scope::Shop(id) => write!(f, "shop:{id}"),
        }
    }
}

/// Card data for one carousel entry. The server sends a different document
/// per category; only what a card needs is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryItem {
    pub id: String,
    pub title: String,
    pub media: Option<String>,
    pub type_label: Option<String>,
    pub kind: Category,
    pub meta: BTreeMap<String, String>,
}

/// Keys copied into `meta` when the document has them.
const META_KEYS: [&str; 6] = ["location", "address", "date", "startDate", "price", "category"];

impl CategoryItem {
    /// Build a card out of a raw document of the given category.
    pub fn from_value(kind: Category, value: &Value) -> Option<Self> {
        let doc = value.as_object()?;
        let id = doc.get("_id").or_else(|| doc.get("id"))?.as_str()?.to_string();
        let title = ["title", "name"]
            .iter()
            .find_map(|key| doc.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        let media = ["images", "media"]
            .iter()
            .find_map(|key| {
                doc.get(*key)
                    .and_then(Value::as_array)
                    .and_then(|list| list.first())
                    .and_then(Value::as_str)
            })
            .or_else(|| doc.get("image").and_then(Value::as_str))
            .map(str::to_string);
        let type_label = doc.get("type").and_then(Value::as_str).map(str::to_string);

        let mut meta = BTreeMap::new();
        for key in META_KEYS {
            match doc.get(key) {
                Some(Value::String(val)) => {
                    meta.insert(key.to_string(), val.clone());
                }
                Some(Value::Number(val)) => {
                    meta.insert(key.to_string(), val.to_string());
                }
                _ => {}
            }
        }

        Some(Self {
            id,
            title,
            media,
            type_label,
            kind,
            meta,
        })
    }
}

impl Display for CategoryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(label) = &self.type_label {
            write!(f, " ({label})")?;
        }
        Ok(())
    }
}

/// A promotional media item shown in the ad-spot carousels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSpot {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub media: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub shop_id: Option<String>,
}

/// Ad spots carry either a single `media` url or a list of them.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(url)) => vec![url],
        Some(OneOrMany::Many(urls)) => urls,
        None => vec![],
    })
}
