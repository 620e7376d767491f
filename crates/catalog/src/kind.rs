use serde::{Deserialize, Serialize};

/// What sort of product an item is.
///
/// New kinds are added as variants; code that only needs a label goes through
/// [`ItemKind::describe`] and never matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemKind {
    Book { author: String, isbn: String },
    Album { artist: String, etc: String },
    Movie { director: String, actor: String },
}

impl ItemKind {
    /// Stable discriminator, also used as the `kind` column by the SQL store.
    pub fn tag(&self) -> &'static str {
        match self {
            ItemKind::Book { .. } => "book",
            ItemKind::Album { .. } => "album",
            ItemKind::Movie { .. } => "movie",
        }
    }

    /// One-line human description of the kind-specific attributes.
    pub fn describe(&self) -> String {
        match self {
            ItemKind::Book { author, isbn } => format!("book by {author} (isbn {isbn})"),
            ItemKind::Album { artist, etc } if etc.is_empty() => format!("album by {artist}"),
            ItemKind::Album { artist, etc } => format!("album by {artist} ({etc})"),
            ItemKind::Movie { director, actor } => {
                format!("movie directed by {director}, starring {actor}")
            }
        }
    }

    pub fn isbn(&self) -> Option<&str> {
        match self {
            ItemKind::Book { isbn, .. } => Some(isbn),
            _ => None,
        }
    }
}
