use crate::app::models::{ContextDocument, SectionKind, TreeNode};

pub struct OutputGenerator;

impl OutputGenerator {
    pub fn render_tree(root: &TreeNode) -> String {
        fn walk(node: &TreeNode, depth: usize, lines: &mut Vec<String>) {
            for child in &node.children {
                let indent = "    ".repeat(depth);
                let marker = if child.is_dir() { "/" } else { "" };
                lines.push(format!("{}├── {}{}", indent, child.name, marker));
                if child.is_dir() {
                    walk(child, depth + 1, lines);
                }
            }
        }

        let mut lines = vec![".".to_string()];
        walk(root, 1, &mut lines);
        lines.join("\n")
    }

    pub fn header(generated_on: Option<&str>) -> String {
        let mut out = String::from("# Repository Context\n\n");
        if let Some(date) = generated_on {
            out.push_str(&format!("Generated on: {}\n\n", date));
        }
        out
    }

    pub fn file_block(relative_path: &str, language: Option<&str>, body: &str) -> String {
        format!(
            "## {}\n```{}\n{}\n```\n\n",
            relative_path,
            language.unwrap_or_default(),
            body
        )
    }

    pub fn missing_file(relative_path: &str) -> String {
        format!("*File `{}` not found, skipping...*\n\n", relative_path)
    }

    pub fn binary_placeholder(ext: &str) -> String {
        format!("*Binary file (.{}) cannot be displayed.*", ext)
    }

    pub fn format_document(doc: &ContextDocument) -> String {
        let mut out = String::new();

        for section in &doc.sections {
            match section.kind {
                SectionKind::Header | SectionKind::Global => {
                    out.push_str(&section.body);
                    if !section.body.is_empty() && !section.body.ends_with('\n') {
                        out.push('\n');
                    }
                }
                SectionKind::DirectoryTree => {
                    out.push_str(&format!("## {}\n\n```\n{}\n```\n\n", section.title, section.body));
                }
                _ => {
                    out.push_str(&format!("## {}\n\n", section.title));
                    // Bodies are verbatim; only pad up to one blank line
                    let body = &section.body;
                    let padding = if body.is_empty() || body.ends_with("\n\n") {
                        ""
                    } else if body.ends_with('\n') {
                        "\n"
                    } else {
                        "\n\n"
                    };
                    out.push_str(body);
                    out.push_str(padding);
                }
            }
        }

        out
    }
}
