//! # Field renaming
//!
//! Source catalog names are verbose (`base_SdssCentroid_ra`); the transformed
//! tables use short, lowercase identifiers (`sdsscentroid_ra`). A [`RenameRule`]
//! pairs a regular expression, matched case-insensitively at the *start* of a
//! name, with a [`Replacement`] for the matched part; the rest of the name is
//! kept as a suffix.
//!
//! Rules of an algorithm are tried in order and the first match wins. Every
//! resulting name, matched or not, goes through [`to_safe_ident`].
//!
//! ```rust
//! use skyframe::rename::{RenameRule, Renamer};
//!
//! let rules = [RenameRule::template(r"base_", "")];
//! let renamer = Renamer::new(&rules).unwrap();
//! assert_eq!(renamer.rename("base_SdssCentroid_raSigma"), "sdsscentroid_rasigma");
//! assert_eq!(renamer.rename("Other-Name"), "other_name");
//! ```
use regex::{Captures, Regex, RegexBuilder};
use tracing::warn;

use crate::{constants::DEFAULT_PIXEL_SCALE, skyframe_errors::SkyframeError};

/// Replacement computed from the captures of a match.
pub type Replacer = fn(&Captures) -> String;

#[derive(Debug, Clone)]
pub enum Replacement {
    /// Expanded with `$n` / `${name}` group references.
    Template(String),
    Function(Replacer),
}

#[derive(Debug, Clone)]
pub struct RenameRule {
    pub pattern: String,
    pub replacement: Replacement,
}

impl RenameRule {
    pub fn template(pattern: &str, replacement: &str) -> Self {
        RenameRule {
            pattern: pattern.to_string(),
            replacement: Replacement::Template(replacement.to_string()),
        }
    }

    pub fn function(pattern: &str, replacer: Replacer) -> Self {
        RenameRule {
            pattern: pattern.to_string(),
            replacement: Replacement::Function(replacer),
        }
    }
}

struct CompiledRule<'a> {
    regex: Regex,
    replacement: &'a Replacement,
}

impl CompiledRule<'_> {
    fn apply(&self, name: &str) -> Option<String> {
        let caps = self.regex.captures(name)?;
        let end = caps.get(0)?.end();

        let mut renamed = match self.replacement {
            Replacement::Template(template) => {
                let mut dst = String::new();
                caps.expand(template, &mut dst);
                dst
            }
            Replacement::Function(replacer) => replacer(&caps),
        };
        renamed.push_str(&name[end..]);
        Some(renamed)
    }
}

/// The compiled rename rules of one algorithm.
pub struct Renamer<'a> {
    rules: Vec<CompiledRule<'a>>,
}

impl<'a> Renamer<'a> {
    /// Compile `rules`, anchored at the start and case-insensitive.
    ///
    /// Return
    /// ----------
    /// * `Err(SkyframeError::InvalidRenameRule)`: a pattern is not a valid regular expression.
    pub fn new(rules: &'a [RenameRule]) -> Result<Self, SkyframeError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = RegexBuilder::new(&format!("^(?:{})", rule.pattern))
                    .case_insensitive(true)
                    .build()?;
                Ok(CompiledRule {
                    regex,
                    replacement: &rule.replacement,
                })
            })
            .collect::<Result<Vec<_>, SkyframeError>>()?;

        Ok(Renamer { rules })
    }

    /// Rename with the first matching rule, then sanitize.
    pub fn rename(&self, name: &str) -> String {
        let renamed = self
            .rules
            .iter()
            .find_map(|rule| rule.apply(name))
            .unwrap_or_else(|| name.to_string());
        to_safe_ident(&renamed)
    }
}

/// Lowercase `name` and force it into `[a-z_][a-z0-9_]*`, replacing offending characters by `_`.
pub fn to_safe_ident(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            'a'..='z' | '_' => c,
            '0'..='9' if i > 0 => c,
            _ => '_',
        })
        .collect()
}

/// Text of capture group `index`, empty when the group did not participate.
pub fn group<'h>(caps: &Captures<'h>, index: usize) -> &'h str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// Text matched by a rule, unchanged, for replacers that cannot use their captures.
pub fn keep_match(caps: &Captures) -> String {
    let matched = group(caps, 0);
    warn!(matched, "rename rule could not use its captures, name kept");
    matched.to_string()
}

/// Aperture diameter in tenths of an arcsecond from a radius in pixels written as
/// `<integer>_<fraction>`, at the default pixel scale.
///
/// Return
/// ----------
/// * `None` when the two parts do not form a decimal number.
pub fn aperture_diameter(radius: &str, radius_frac: &str) -> Option<String> {
    let radius: f64 = format!("{radius}.{radius_frac}").parse().ok()?;
    let diameter = DEFAULT_PIXEL_SCALE * 2.0 * radius;
    Some(format!("{}", (diameter * 10.0).round() as i64))
}
