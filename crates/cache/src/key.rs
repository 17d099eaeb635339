use std::collections::BTreeMap;
use std::fmt;

/// Identifies one logical upstream query.
///
/// A key is the source name plus the parameters that change what the
/// upstream returns. Parameters are kept sorted, so insertion order never
/// affects the rendered key. Names and values are percent-encoded before
/// they are joined, which keeps distinct parameter sets from rendering to
/// the same string.
///
/// ```
/// use cache::CacheKey;
///
/// let a = CacheKey::new("reddit").param("subreddit", "annarbor").param("sort", "hot");
/// let b = CacheKey::new("reddit").param("sort", "hot").param("subreddit", "annarbor");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "reddit?sort=hot&subreddit=annarbor");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter. Setting the same name twice keeps the last value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a parameter only when a value is present.
    pub fn param_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// File name used to store this key on disk.
    ///
    /// The rendered key is percent-encoded a second time so that it never
    /// contains a path separator.
    pub(crate) fn file_stem(&self) -> String {
        urlencoding::encode(&self.to_string()).into_owned()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&urlencoding::encode(&self.source))?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(
                f,
                "{}{}={}",
                sep,
                urlencoding::encode(name),
                urlencoding::encode(value)
            )?;
        }
        Ok(())
    }
}
