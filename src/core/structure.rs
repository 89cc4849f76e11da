use ignore::WalkBuilder;
use std::path::Path;

/// Lists the repository layout down to `depth` levels as `[DIR] name` and
/// `[FILE] name` lines, each directory followed by its own entries.
///
/// Entries appear in filesystem iteration order, which differs between
/// platforms. A depth of 0 yields an empty listing.
pub fn project_structure(root: &Path, depth: usize) -> String {
    if depth == 0 {
        return String::new();
    }

    let walker = WalkBuilder::new(root)
        .max_depth(Some(depth))
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut lines = Vec::new();
    for entry in walker.flatten() {
        if entry.depth() == 0 {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
        if is_dir {
            lines.push(format!("[DIR] {}", name));
        } else {
            lines.push(format!("[FILE] {}", name));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("README.md"), "readme").unwrap();
        fs::write(dir.path().join("src/main.py"), "print()").unwrap();
        fs::write(dir.path().join("src/nested/deep.py"), "x = 1").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        dir
    }

    #[test]
    fn depth_zero_is_empty() {
        let dir = sample_tree();
        assert_eq!(project_structure(dir.path(), 0), "");
    }

    #[test]
    fn depth_one_lists_top_level_only() {
        let dir = sample_tree();
        let structure = project_structure(dir.path(), 1);
        let mut lines: Vec<&str> = structure.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["[DIR] src", "[FILE] README.md"]);
    }

    #[test]
    fn children_follow_their_directory() {
        let dir = sample_tree();
        let structure = project_structure(dir.path(), 3);
        let lines: Vec<&str> = structure.lines().collect();

        assert!(!structure.contains(".git"));
        assert!(lines.contains(&"[FILE] deep.py"));

        let src = lines.iter().position(|l| *l == "[DIR] src").unwrap();
        let main = lines.iter().position(|l| *l == "[FILE] main.py").unwrap();
        let nested = lines.iter().position(|l| *l == "[DIR] nested").unwrap();
        let deep = lines.iter().position(|l| *l == "[FILE] deep.py").unwrap();
        assert!(src < main && src < nested && nested < deep);
    }
}
