use super::{CodeArena, NodeId, NodeKind};
use crate::codegen::with_root;

const INDENT: &str = "    ";

fn line(out: &mut String, indent: usize, text: &str) {
    out.push_str(&INDENT.repeat(indent));
    out.push_str(text);
    out.push('\n');
}

impl CodeArena {
    /// Renders the sequence starting at `id` as Rust source, calling the candidate `root`
    pub fn render(&self, id: NodeId, indent: usize, root: &str) -> String {
        let mut out = String::new();
        self.render_into(&mut out, id, indent, root);
        out
    }

    fn render_into(&self, out: &mut String, id: NodeId, indent: usize, root: &str) {
        let mut current = Some(id);

        while let Some(node_id) = current {
            let node = self.node(node_id);
            match &node.kind {
                NodeKind::NoOp | NodeKind::Placeholder => {
                    if let Some(comment) = &node.comment {
                        line(out, indent, &format!("// {comment}"));
                    }
                }
                NodeKind::If(branch) if !node.commented_out => {
                    let guard = with_root(&branch.guard.serialize(), root);
                    match &node.comment {
                        Some(comment) => line(out, indent, &format!("if {guard} {{ // {comment}")),
                        None => line(out, indent, &format!("if {guard} {{")),
                    }
                    self.render_into(out, branch.then_body(), indent + 1, root);

                    for &else_if in branch.else_ifs() {
                        if let Some(inner) = self.branch(else_if) {
                            let guard = with_root(&inner.guard.serialize(), root);
                            line(out, indent, &format!("}} else if {guard} {{"));
                            self.render_into(out, inner.then_body(), indent + 1, root);
                        }
                    }

                    if !self.is_blank(branch.else_body()) {
                        line(out, indent, "} else {");
                        self.render_into(out, branch.else_body(), indent + 1, root);
                    }
                    line(out, indent, "}");
                }
                _ => {
                    let content = with_root(&self.content(node_id), root);
                    let mut text = if node.commented_out {
                        format!("// {content}")
                    } else {
                        content
                    };
                    if let Some(comment) = &node.comment {
                        text.push_str(" // ");
                        text.push_str(comment);
                    }
                    line(out, indent, &text);
                }
            }

            current = self.next(node_id);
        }
    }
}
