use crate::document::Document;
use crate::error::{Error, ErrorKind, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Open,
    Done,
}

/// Parent links, a parent-before-child order and reachability for the
/// nodes of one document.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub parents: Vec<Option<usize>>,
    pub topo_order: Vec<usize>,
    pub renderable: Vec<bool>,
}

impl SceneGraph {
    pub fn solve(doc: &Document) -> Result<Self> {
        let count = doc.nodes.len();
        let out_of_range = doc
            .nodes
            .iter()
            .flat_map(|node| node.children.iter())
            .chain(doc.root_nodes.iter())
            .find(|&&n| n >= count);
        if let Some(&n) = out_of_range {
            return Err(Error::parse(format!("node index {n} out of range, only {count} nodes")));
        }

        let mut parents: Vec<Option<usize>> = vec![None; count];
        for (index, node) in doc.nodes.iter().enumerate() {
            for &child in &node.children {
                match parents[child] {
                    None => parents[child] = Some(index),
                    Some(existing) if existing != index => log::warn!(
                        "node {child} is a child of both {existing} and {index}, keeping {existing}"
                    ),
                    Some(_) => {}
                }
            }
        }

        find_cycle(doc)?;

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (child, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                children[*parent].push(child);
            }
        }

        let mut topo_order = Vec::with_capacity(count);
        let forest_roots = (0..count).filter(|&i| parents[i].is_none());
        walk(forest_roots, &children, |node| topo_order.push(node));

        let mut renderable = vec![false; count];
        let declared_roots = doc.root_nodes.iter().copied().filter(|&r| parents[r].is_none());
        walk(declared_roots, &children, |node| renderable[node] = true);

        // Declared roots with a parent are only reached through that parent.
        for &root in &doc.root_nodes {
            if parents[root].is_some() {
                log::warn!("root node {root} also has a parent");
            }
        }

        log::debug!(
            "scene graph: {count} nodes, {} renderable",
            renderable.iter().filter(|r| **r).count()
        );

        Ok(Self {
            parents,
            topo_order,
            renderable,
        })
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.parents.get(node).copied().flatten()
    }

    pub fn is_renderable(&self, node: usize) -> bool {
        self.renderable.get(node).copied().unwrap_or(false)
    }
}

fn walk(roots: impl Iterator<Item = usize>, children: &[Vec<usize>], mut visit: impl FnMut(usize)) {
    let mut stack: Vec<usize> = Vec::new();
    for root in roots {
        stack.push(root);
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(children[node].iter().rev());
        }
    }
}

/// Iterative three-colour DFS over the declared child lists.
fn find_cycle(doc: &Document) -> Result<()> {
    let mut marks = vec![Mark::Unvisited; doc.nodes.len()];

    for start in 0..doc.nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        // (node, next child position)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::Open;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let Some(&child) = doc.nodes[node].children.get(top.1) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match marks[child] {
                Mark::Open => return Err(Error::new(ErrorKind::CyclicSceneGraph(child))),
                Mark::Done => {}
                Mark::Unvisited => {
                    marks[child] = Mark::Open;
                    stack.push((child, 0));
                }
            }
        }
    }

    Ok(())
}
