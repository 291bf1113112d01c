//! Responsive descriptor builder
//!
//! Expands one reference into width variants and a sizes list for a
//! renderer's layout engine. Everything here is pure and synchronous.

use serde::{Deserialize, Serialize};

/// Candidate widths used when none are given
pub const DEFAULT_WIDTHS: [u32; 5] = [640, 768, 1024, 1280, 1920];

/// Candidate widths for hero images
pub const HERO_WIDTHS: [u32; 6] = [640, 768, 1024, 1280, 1920, 2560];

/// Named sets of candidate widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WidthProfile {
    #[default]
    Default,
    Hero,
}

impl WidthProfile {
    pub fn widths(&self) -> &'static [u32] {
        match self {
            WidthProfile::Default => &DEFAULT_WIDTHS,
            WidthProfile::Hero => &HERO_WIDTHS,
        }
    }
}

/// Produces the URL of one width variant
pub trait UrlPolicy: Send + Sync {
    fn url_for(&self, reference: &str, width: u32) -> String;
}

/// Appends the width as a `w` query parameter
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWidthUrlPolicy;

impl UrlPolicy for QueryWidthUrlPolicy {
    fn url_for(&self, reference: &str, width: u32) -> String {
        let separator = if reference.contains('?') { '&' } else { '?' };
        format!("{}{}w={}", reference, separator, width)
    }
}

impl<F> UrlPolicy for F
where
    F: Fn(&str, u32) -> String + Send + Sync,
{
    fn url_for(&self, reference: &str, width: u32) -> String {
        self(reference, width)
    }
}

/// Width variants and sizes rules for one reference
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponsiveDescriptor {
    /// `(url, width)` pairs in candidate order
    pub candidates: Vec<(String, u32)>,

    /// `(media condition, size expression)` pairs in caller order
    pub sizes: Vec<(String, String)>,

    /// Size expression used when no condition matches
    pub fallback_size: Option<String>,
}

impl ResponsiveDescriptor {
    /// Render the candidates as `"<url> <w>w, ..."`
    pub fn srcset(&self) -> String {
        self.candidates
            .iter()
            .map(|(url, width)| format!("{} {}w", url, width))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render the sizes rules as `"<condition> <expression>, ..."`
    pub fn sizes(&self) -> String {
        join_sizes(&self.sizes, self.fallback_size.as_deref())
    }

    pub fn widths(&self) -> Vec<u32> {
        self.candidates.iter().map(|(_, w)| *w).collect()
    }
}

/// One `(url, width)` entry per width, in the order given
pub fn build_descriptor(
    reference: &str,
    widths: &[u32],
    policy: &dyn UrlPolicy,
) -> Vec<(String, u32)> {
    widths
        .iter()
        .map(|&width| (policy.url_for(reference, width), width))
        .collect()
}

/// Join sizes rules in the order given, optionally ending with a fallback
pub fn join_sizes<C, E>(rules: &[(C, E)], fallback: Option<&str>) -> String
where
    C: AsRef<str>,
    E: AsRef<str>,
{
    rules
        .iter()
        .map(|(condition, expression)| format!("{} {}", condition.as_ref(), expression.as_ref()))
        .chain(fallback.map(str::to_string))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Builder for [`ResponsiveDescriptor`]
pub struct DescriptorBuilder<'a> {
    reference: String,
    widths: Option<Vec<u32>>,
    profile: WidthProfile,
    sizes: Vec<(String, String)>,
    fallback_size: Option<String>,
    policy: Box<dyn UrlPolicy + 'a>,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            widths: None,
            profile: WidthProfile::Default,
            sizes: Vec::new(),
            fallback_size: None,
            policy: Box::new(QueryWidthUrlPolicy),
        }
    }

    /// Explicit candidate widths; overrides the profile
    pub fn widths(mut self, widths: impl IntoIterator<Item = u32>) -> Self {
        self.widths = Some(widths.into_iter().collect());
        self
    }

    pub fn profile(mut self, profile: WidthProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Append a sizes rule
    pub fn size(mut self, condition: impl Into<String>, expression: impl Into<String>) -> Self {
        self.sizes.push((condition.into(), expression.into()));
        self
    }

    pub fn fallback_size(mut self, expression: impl Into<String>) -> Self {
        self.fallback_size = Some(expression.into());
        self
    }

    pub fn url_policy(mut self, policy: impl UrlPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn build(self) -> ResponsiveDescriptor {
        let widths = match &self.widths {
            Some(widths) => widths.as_slice(),
            None => self.profile.widths(),
        };

        ResponsiveDescriptor {
            candidates: build_descriptor(&self.reference, widths, self.policy.as_ref()),
            sizes: self.sizes,
            fallback_size: self.fallback_size,
        }
    }
}
