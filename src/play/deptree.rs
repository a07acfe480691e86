//! `deptree`: print each root service's `requires` subtree with ASCII
//! branches, pruning duplicates already shown within a root's own tree
//! unless `recursive` is set (§4.F).

use std::collections::BTreeSet;

use crate::error::{MaestroError, Result};
use crate::model::Environment;

/// One line of a rendered dependency tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    pub depth: usize,
    pub service: String,
    /// True if this line was pruned as an already-shown duplicate (printed
    /// with a marker rather than expanded further).
    pub pruned: bool,
}

/// Render the `requires` subtree for each root name.
pub fn run(environment: &Environment, roots: &BTreeSet<String>, recursive: bool) -> Result<Vec<TreeLine>> {
    let mut lines = Vec::new();
    for root in roots {
        environment
            .service(root)
            .map_err(|_| MaestroError::configuration(format!("`{root}` is not a known service")))?;
        let mut seen = BTreeSet::new();
        lines.push(TreeLine {
            depth: 0,
            service: root.clone(),
            pruned: false,
        });
        seen.insert(root.clone());
        walk(environment, root, 1, recursive, &mut seen, &mut lines)?;
    }
    Ok(lines)
}

fn walk(
    environment: &Environment,
    name: &str,
    depth: usize,
    recursive: bool,
    seen: &mut BTreeSet<String>,
    lines: &mut Vec<TreeLine>,
) -> Result<()> {
    let service = environment.service(name)?;
    for dep in &service.requires {
        let dep_name = dep.to_string();
        let already_shown = !recursive && seen.contains(&dep_name);
        lines.push(TreeLine {
            depth,
            service: dep_name.clone(),
            pruned: already_shown,
        });
        if already_shown {
            continue;
        }
        seen.insert(dep_name.clone());
        walk(environment, &dep_name, depth + 1, recursive, seen, lines)?;
    }
    Ok(())
}

/// Render tree lines into ASCII-branch text, one line per entry.
pub fn render(lines: &[TreeLine]) -> String {
    let mut out = String::new();
    for line in lines {
        if line.depth == 0 {
            out.push_str(&line.service);
            out.push('\n');
            continue;
        }
        for _ in 0..line.depth - 1 {
            out.push_str("|   ");
        }
        out.push_str("`-- ");
        out.push_str(&line.service);
        if line.pruned {
            out.push_str(" (*)");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Service, ServiceName};

    fn env_with_chain() -> Environment {
        let mut env = Environment::new("test", 2);
        let mut a = Service::new(ServiceName::new("a"), "img:a", 2);
        let mut b = Service::new(ServiceName::new("b"), "img:b", 2);
        let c = Service::new(ServiceName::new("c"), "img:c", 2);
        a.requires.insert(ServiceName::new("b"));
        a.requires.insert(ServiceName::new("c"));
        b.requires.insert(ServiceName::new("c"));
        env.services.insert(ServiceName::new("a"), a);
        env.services.insert(ServiceName::new("b"), b);
        env.services.insert(ServiceName::new("c"), c);
        env
    }

    #[test]
    fn prunes_duplicate_by_default() {
        let env = env_with_chain();
        let roots = BTreeSet::from(["a".to_string()]);
        let lines = run(&env, &roots, false).unwrap();
        let c_lines: Vec<_> = lines.iter().filter(|l| l.service == "c").collect();
        assert_eq!(c_lines.len(), 2);
        assert!(c_lines.iter().any(|l| l.pruned));
    }

    #[test]
    fn recursive_expands_every_occurrence() {
        let env = env_with_chain();
        let roots = BTreeSet::from(["a".to_string()]);
        let lines = run(&env, &roots, true).unwrap();
        assert!(lines.iter().all(|l| !l.pruned));
    }

    #[test]
    fn unknown_root_is_an_error() {
        let env = env_with_chain();
        let roots = BTreeSet::from(["nope".to_string()]);
        assert!(run(&env, &roots, false).is_err());
    }
}
