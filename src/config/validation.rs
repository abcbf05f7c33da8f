use super::ProviderConfig;
use crate::error::ShellError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Characters a selector may start with: type, id, class, attribute,
/// universal or pseudo selectors.
static SELECTOR_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_\-#.\[*:]").expect("valid selector regex"));

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

impl ConfigValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate a configuration record.
pub fn validate_config(config: &ProviderConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    if config.auth.token.trim().is_empty() {
        errors.push(ConfigValidationError::new(
            "auth.token",
            "Token is required (set SAMMY_JWT_TOKEN)",
        ));
    }

    if let Err(message) = validate_base_url(&config.auth.base_url) {
        errors.push(ConfigValidationError::new("auth.baseUrl", message));
    }

    if let Some(selector) = &config.target_element {
        if let Err(message) = validate_selector(selector) {
            errors.push(ConfigValidationError::new("targetElement", message));
        }
    }

    errors
}

/// Validate configuration and return Result.
pub fn validate_config_object(config: &ProviderConfig) -> Result<(), ShellError> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ShellError::ConfigurationInvalid(errors))
    }
}

fn validate_base_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("Invalid URL '{raw}': {e}"))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        "http" | "https" => Err(format!("URL '{raw}' has no host")),
        other => Err(format!("Unsupported URL scheme '{other}'")),
    }
}

/// Structural check of a CSS selector: it must start like a selector, must
/// not begin or end with a combinator, and must close every bracket,
/// parenthesis and quote it opens.
pub fn validate_selector(selector: &str) -> Result<(), String> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err("Selector is empty".to_string());
    }
    if !SELECTOR_START.is_match(trimmed) {
        return Err(format!("Selector '{trimmed}' does not start with a simple selector"));
    }
    if trimmed.ends_with(['>', '+', '~', ',']) {
        return Err(format!("Selector '{trimmed}' ends with a combinator"));
    }

    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut entry_empty = true;
    for c in trimmed.chars() {
        // Only top-level commas separate selector list entries.
        if c == ',' && !escaped && quote.is_none() && stack.is_empty() {
            if entry_empty {
                return Err(format!("Selector '{trimmed}' has an empty selector list entry"));
            }
            entry_empty = true;
            continue;
        }
        if !c.is_whitespace() {
            entry_empty = false;
        }
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => stack.push(c),
            ']' | ')' => {
                let expected = if c == ']' { '[' } else { '(' };
                if stack.pop() != Some(expected) {
                    return Err(format!("Selector '{trimmed}' has an unmatched '{c}'"));
                }
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(format!("Selector '{trimmed}' has an unterminated string"));
    }
    if let Some(open) = stack.pop() {
        return Err(format!("Selector '{trimmed}' has an unclosed '{open}'"));
    }
    Ok(())
}
