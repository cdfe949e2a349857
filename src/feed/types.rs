use serde::{Deserialize, Deserializer};

/// One listing entry as fetched from the feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub score: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: String,
    /// Epoch seconds. The API sends a float; the fraction is dropped.
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_utc: i64,
    /// Fullname (`t3_<id>`) used as the `after` cursor. Never persisted.
    #[serde(default)]
    pub name: String,
}

/// `{"kind": "Listing", "data": {"children": [...], "after": ...}}`
#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Envelope>,
}

/// `{"kind": "t3", "data": {...}}`
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub data: ContentItem,
}

impl Listing {
    /// Unwrap the envelopes, keeping page order.
    pub fn into_items(self) -> Vec<ContentItem> {
        self.data.children.into_iter().map(|c| c.data).collect()
    }
}

fn epoch_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Epoch {
        Int(i64),
        Float(f64),
    }

    match Epoch::deserialize(deserializer)? {
        Epoch::Int(secs) => Ok(secs),
        Epoch::Float(secs) if secs.is_finite() => Ok(secs.trunc() as i64),
        Epoch::Float(secs) => Err(serde::de::Error::custom(format!(
            "created_utc is not a finite number: {}",
            secs
        ))),
    }
}
