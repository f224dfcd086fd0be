//! Path arithmetic for the browse window.
//!
//! Browse paths are logical, slash-delimited and rooted at the library root
//! (`/`). The player addresses the same entries without the leading slash;
//! [`library_uri`] converts between the two. All functions here are total.

const ROOT: &str = "/";

fn is_padding(c: char) -> bool {
    c == '/' || c == ' '
}

/// Resolve `relative` against the working directory `wd`.
///
/// `""` and `"."` return `wd`, `".."` returns its parent (root stays root),
/// a leading `/` marks an already absolute path.
pub fn absolute(wd: &str, relative: &str) -> String {
    match relative {
        "" | "." => wd.to_string(),
        ".." => parent(wd),
        rel if rel.starts_with('/') => rel.to_string(),
        rel => format!(
            "{}/{}",
            wd.trim_end_matches(is_padding),
            rel.trim_matches(is_padding)
        ),
    }
}

/// Parent directory of an absolute path. Root (or anything that cannot be
/// split further) resolves to root.
pub fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches(is_padding);
    match trimmed.rfind('/') {
        Some(idx) if idx > 0 => trimmed[..idx].to_string(),
        _ => ROOT.to_string(),
    }
}

/// Last segment of a path, `""` for an all-slash input.
pub fn basename(path: &str) -> &str {
    path.trim_matches('/').rsplit('/').next().unwrap_or("")
}

/// Player-side URI of a browse path: no surrounding slashes or spaces.
pub fn library_uri(path: &str) -> &str {
    path.trim_matches(is_padding)
}

/// Absolute browse path of the directory containing a library file.
pub fn containing_dir(file_uri: &str) -> String {
    let uri = library_uri(file_uri);
    match uri.rfind('/') {
        Some(idx) => format!("/{}", &uri[..idx]),
        None => ROOT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_trivial_relatives() {
        assert_eq!(absolute("/music/jazz", ""), "/music/jazz");
        assert_eq!(absolute("/music/jazz", "."), "/music/jazz");
    }

    #[test]
    fn test_absolute_parent() {
        assert_eq!(absolute("/music/jazz", ".."), "/music");
        assert_eq!(absolute("/music/jazz/", ".."), "/music");
        assert_eq!(absolute("/music", ".."), "/");
        assert_eq!(absolute("/", ".."), "/");
        assert_eq!(absolute("", ".."), "/");
    }

    #[test]
    fn test_parent_repeatedly_stabilizes_at_root() {
        for start in ["/a/b/c/d", "/a", "/", "", "//x//y//", "no-slash"] {
            let mut p = start.to_string();
            for _ in 0..10 {
                p = absolute(&p, "..");
            }
            assert_eq!(p, "/", "starting from {:?}", start);
        }
    }

    #[test]
    fn test_absolute_passes_absolute_through() {
        assert_eq!(absolute("/music", "/podcasts/x"), "/podcasts/x");
    }

    #[test]
    fn test_absolute_joins_with_single_separator() {
        assert_eq!(absolute("/music/", " jazz/ "), "/music/jazz");
        assert_eq!(absolute("/", "jazz"), "/jazz");
        assert_eq!(absolute("", "jazz"), "/jazz");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("/music/jazz/"), "jazz");
        assert_eq!(basename("music/a.flac"), "a.flac");
        assert_eq!(basename("single"), "single");
        assert_eq!(basename("///"), "");
        assert_eq!(basename(""), "");
    }

    #[test]
    fn test_library_uri() {
        assert_eq!(library_uri("/music/jazz/ "), "music/jazz");
        assert_eq!(library_uri("/"), "");
    }

    #[test]
    fn test_containing_dir() {
        assert_eq!(containing_dir("music/jazz/a.flac"), "/music/jazz");
        assert_eq!(containing_dir("a.flac"), "/");
    }
}
