use std::collections::HashSet;

/// Paths that bypass inspection.
///
/// Entries ending in `*` are prefixes (the `*` is dropped); all others are
/// exact paths. Both kinds compare case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for url in urls {
            let url = url.as_ref();
            match url.strip_suffix('*') {
                Some(prefix) => list.prefixes.push(prefix.to_lowercase()),
                None => {
                    list.exact.insert(url.to_lowercase());
                }
            }
        }
        list
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// Whether `path` (without query string) is exempt from inspection.
    pub fn is_allowed(&self, path: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let path = path.to_lowercase();
        self.exact.contains(&path) || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_allows_nothing() {
        let list = AllowList::new(Vec::<String>::new());
        assert!(list.is_empty());
        assert!(!list.is_allowed("/"));
        assert!(!list.is_allowed(""));
    }

    #[test]
    fn exact_match_ignores_case() {
        let list = AllowList::new(["/Admins/Logs/Ajax/GetLoginList"]);
        assert!(list.is_allowed("/Admins/Logs/Ajax/GetLoginList"));
        assert!(list.is_allowed("/admins/logs/ajax/getloginlist"));
        assert!(!list.is_allowed("/Admins/Logs/Ajax/GetLoginList/extra"));
        assert!(!list.is_allowed("/Admins/Logs/Ajax"));
    }

    #[test]
    fn prefix_match_ignores_case() {
        let list = AllowList::new(["/static/*"]);
        assert!(list.is_allowed("/static/"));
        assert!(list.is_allowed("/STATIC/app.js"));
        assert!(list.is_allowed("/static/css/site.css"));
    }

    #[test]
    fn prefix_does_not_match_shorter_path() {
        let list = AllowList::new(["/api/admin/*"]);
        assert!(!list.is_allowed("/api/admin"));
        assert!(!list.is_allowed("/api"));
        assert!(list.is_allowed("/api/admin/users"));
    }

    #[test]
    fn bare_wildcard_allows_everything() {
        let list = AllowList::new(["*"]);
        assert!(list.is_allowed("/anything"));
    }

    #[test]
    fn mixed_entries() {
        let list = AllowList::new(["/health", "/docs*"]);
        assert!(list.is_allowed("/HEALTH"));
        assert!(list.is_allowed("/docs"));
        assert!(list.is_allowed("/documents"));
        assert!(!list.is_allowed("/healthz"));
    }
}
