use fitsio_pure::header::Card;

use super::FitsError;
use crate::data::model::MetadataValue;

pub use fitsio_pure::value::Value as HeaderValue;

fn describe(value: &HeaderValue) -> String {
    match value {
        HeaderValue::Logical(b) => (if *b { "T" } else { "F" }).to_string(),
        HeaderValue::Integer(i) => i.to_string(),
        HeaderValue::Float(v) => v.to_string(),
        HeaderValue::String(s) => s.clone(),
        HeaderValue::ComplexInt(re, im) => format!("({re}, {im})"),
        HeaderValue::ComplexFloat(re, im) => format!("({re}, {im})"),
        HeaderValue::Undefined => String::new(),
    }
}

fn to_metadata(keyword: &str, value: &HeaderValue) -> MetadataValue {
    match value {
        HeaderValue::Logical(b) => MetadataValue::Bool(*b),
        HeaderValue::Integer(i) => MetadataValue::Integer(*i),
        HeaderValue::Float(v) => MetadataValue::Float(*v),
        HeaderValue::String(s) if keyword.starts_with("DATE") => {
            MetadataValue::Date(s.trim_end().to_string())
        }
        HeaderValue::String(s) => MetadataValue::String(s.trim_end().to_string()),
        HeaderValue::ComplexInt(..) | HeaderValue::ComplexFloat(..) => {
            MetadataValue::String(describe(value))
        }
        HeaderValue::Undefined => MetadataValue::Null,
    }
}

/// Ordered header cards of one HDU, excluding `END`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn from_cards(cards: Vec<Card>) -> Header {
        Header {
            cards: cards.into_iter().filter(|c| !c.is_end()).collect(),
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.cards
            .iter()
            .find(|c| c.keyword_str() == keyword)
            .and_then(|c| c.value.as_ref())
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.get(keyword).is_some()
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        match self.get(keyword)? {
            HeaderValue::String(s) => Some(s.trim_end()),
            _ => None,
        }
    }

    /// Optional numeric keyword; present but non-numeric is an error.
    pub fn opt_f64(&self, keyword: &str) -> Result<Option<f64>, FitsError> {
        match self.get(keyword) {
            None => Ok(None),
            Some(HeaderValue::Float(v)) => Ok(Some(*v)),
            Some(HeaderValue::Integer(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(FitsError::InvalidKeyword {
                keyword: keyword.to_string(),
                reason: format!("expected number, found '{}'", describe(other)),
            }),
        }
    }

    /// Optional integer keyword; present but not an integer is an error.
    pub fn opt_i64(&self, keyword: &str) -> Result<Option<i64>, FitsError> {
        match self.get(keyword) {
            None => Ok(None),
            Some(HeaderValue::Integer(i)) => Ok(Some(*i)),
            Some(other) => Err(FitsError::InvalidKeyword {
                keyword: keyword.to_string(),
                reason: format!("expected integer, found '{}'", describe(other)),
            }),
        }
    }

    /// Replace the first card with this keyword, or append a new one.
    ///
    /// Keywords must be 1 to 8 upper-case letters, digits, `-` or `_`.
    pub fn set(&mut self, keyword: &str, value: HeaderValue) -> Result<(), FitsError> {
        match self.cards.iter_mut().find(|c| c.keyword_str() == keyword) {
            Some(card) => card.value = Some(value),
            None => self.cards.push(Card::new(keyword, value)?),
        }
        Ok(())
    }

    /// Valued cards as metadata rows, in header order.
    pub fn to_metadata(&self) -> Vec<(String, MetadataValue)> {
        self.cards
            .iter()
            .filter_map(|c| {
                let keyword = c.keyword_str();
                c.value
                    .as_ref()
                    .map(|v| (keyword.to_string(), to_metadata(keyword, v)))
            })
            .collect()
    }
}
