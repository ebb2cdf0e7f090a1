//! Fence parameter parsing
//!
//! A fence marker line carries a comma separated parameter list:
//! the type tag first, then `key=value` directives or bare flags,
//! e.g. `gnuplot,height=12,nocache`.

use thiserror::Error;

/// Largest accepted `height=` value
pub const MAX_HEIGHT: usize = 10_000;

/// Malformed parameter directive on a single region
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("fence has no type tag")]
    MissingTag,
    #[error("got height, but no height provided")]
    MissingHeight,
    #[error("invalid height given: {0:?}")]
    InvalidHeight(String),
}

/// Parsed parameters of a fence region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeParams {
    /// Declared type tag, as written
    pub tag: String,
    /// Explicit height in lines, if a `height=` directive was given
    pub height: Option<usize>,
    /// Remaining tokens in declaration order
    pub others: Vec<String>,
}

impl NodeParams {
    /// Parse raw parameter tokens (first token is the type tag)
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ParseError> {
        let mut iter = tokens.iter().map(|t| t.as_ref().trim());

        let tag = match iter.next() {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => return Err(ParseError::MissingTag),
        };

        let mut height = None;
        let mut others = Vec::new();

        for token in iter {
            if token.starts_with("height") {
                height = Some(parse_height(token)?);
            } else if !token.is_empty() {
                others.push(token.to_string());
            }
        }

        Ok(Self {
            tag,
            height,
            others,
        })
    }

    /// Check whether a bare flag was declared
    pub fn has_flag(&self, flag: &str) -> bool {
        self.others.iter().any(|o| o == flag)
    }
}

/// Split a raw marker parameter string into tokens
pub fn split_params(raw: &str) -> Vec<String> {
    raw.split(',').map(|t| t.trim().to_string()).collect()
}

fn parse_height(token: &str) -> Result<usize, ParseError> {
    let value = match token.split_once('=') {
        Some((_, value)) => value.trim(),
        None => return Err(ParseError::MissingHeight),
    };

    if value.is_empty() {
        return Err(ParseError::MissingHeight);
    }

    match value.parse::<usize>() {
        Ok(height @ 1..=MAX_HEIGHT) => Ok(height),
        _ => Err(ParseError::InvalidHeight(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_only() {
        let params = NodeParams::parse(&["math"]).unwrap();
        assert_eq!(params.tag, "math");
        assert_eq!(params.height, None);
        assert!(params.others.is_empty());
    }

    #[test]
    fn test_height_and_flags() {
        let params = NodeParams::parse(&split_params("gnuplot, height=12 ,nocache")).unwrap();
        assert_eq!(params.tag, "gnuplot");
        assert_eq!(params.height, Some(12));
        assert_eq!(params.others, vec!["nocache".to_string()]);
        assert!(params.has_flag("nocache"));
    }

    #[test]
    fn test_height_without_value() {
        assert_eq!(
            NodeParams::parse(&["tex", "height"]),
            Err(ParseError::MissingHeight)
        );
        assert_eq!(
            NodeParams::parse(&["tex", "height="]),
            Err(ParseError::MissingHeight)
        );
    }

    #[test]
    fn test_non_numeric_height() {
        assert_eq!(
            NodeParams::parse(&["tex", "height=tall"]),
            Err(ParseError::InvalidHeight("tall".to_string()))
        );
    }

    #[test]
    fn test_zero_height_rejected() {
        assert!(matches!(
            NodeParams::parse(&["math", "height=0"]),
            Err(ParseError::InvalidHeight(_))
        ));
    }

    #[test]
    fn test_oversized_height_rejected() {
        assert_eq!(
            NodeParams::parse(&["math", "height=18446744073709551615"]),
            Err(ParseError::InvalidHeight("18446744073709551615".to_string()))
        );
        assert_eq!(
            NodeParams::parse(&["math", "height=99999999999999999999999"]),
            Err(ParseError::InvalidHeight("99999999999999999999999".to_string()))
        );
        assert_eq!(
            NodeParams::parse(&["math", &format!("height={MAX_HEIGHT}")]).map(|p| p.height),
            Ok(Some(MAX_HEIGHT))
        );
    }

    #[test]
    fn test_missing_tag() {
        let empty: [&str; 0] = [];
        assert_eq!(NodeParams::parse(&empty), Err(ParseError::MissingTag));
        assert_eq!(NodeParams::parse(&[" "]), Err(ParseError::MissingTag));
    }
}
