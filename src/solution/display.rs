//! Rendering of plan trees

use std::fmt;

use super::node::{QuerySolutionNode, Stage};

impl QuerySolutionNode {
    /// One-line form, e.g. `FETCH(OR(IXSCAN[a_1],IXSCAN[b_1]))`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) {
        out.push_str(self.stage.name());
        if let Stage::IndexScan { index, .. } = &self.stage {
            out.push('[');
            out.push_str(&index.name);
            out.push(']');
        }
        if !self.children.is_empty() {
            out.push('(');
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                child.write_summary(out);
            }
            out.push(')');
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        write!(f, "{}{}", indent, self.stage.name())?;
        match &self.stage {
            Stage::CollectionScan { direction } => write!(f, " {}", direction.as_str())?,
            Stage::IndexScan {
                index,
                bounds,
                direction,
            } => write!(
                f,
                " {} {} {} bounds: {}",
                index.name,
                index.key_pattern,
                direction.as_str(),
                bounds
            )?,
            Stage::Or { dedup } => write!(f, " dedup={}", dedup)?,
            Stage::MergeSort { sort, dedup } => write!(f, " {} dedup={}", sort, dedup)?,
            Stage::Sort { pattern, limit } => {
                write!(f, " {}", pattern)?;
                if let Some(limit) = limit {
                    write!(f, " limit={}", limit)?;
                }
            }
            Stage::Limit(n) | Stage::Skip(n) => write!(f, " {}", n)?,
            Stage::Projection { spec, kind } => write!(f, " {} {}", spec, kind.as_str())?,
            Stage::Fetch | Stage::AndHash | Stage::AndSorted => {}
        }
        writeln!(f)?;
        if let Some(filter) = &self.filter {
            writeln!(f, "{}  filter = {}", indent, filter)?;
        }
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for QuerySolutionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
