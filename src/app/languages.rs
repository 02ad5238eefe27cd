/// Maps a file extension (without the dot, any case) to the tag used on its code fence.
///
/// Returns `None` for unknown extensions and for plain text, both of which get
/// an untagged fence.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "py" | "pyi" => Some("python"),
        "json" => Some("json"),
        "env" | "sh" | "bash" => Some("bash"),
        "zsh" => Some("zsh"),
        "js" | "cjs" | "mjs" | "jsx" => Some("javascript"),
        "ts" | "tsx" => Some("typescript"),
        "html" | "htm" => Some("html"),
        "css" => Some("css"),
        "scss" => Some("scss"),
        "csv" => Some("csv"),
        "md" => Some("markdown"),
        "xml" => Some("xml"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "rb" => Some("ruby"),
        "java" => Some("java"),
        "kt" => Some("kotlin"),
        "c" | "h" => Some("c"),
        "cpp" | "cc" | "hpp" => Some("cpp"),
        "cs" => Some("csharp"),
        "php" => Some("php"),
        "swift" => Some("swift"),
        "sql" => Some("sql"),
        _ => None,
    }
}
