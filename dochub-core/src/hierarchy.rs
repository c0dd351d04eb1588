use serde::{Deserialize, Serialize};

/// Node kind in a folder hierarchy template.
///
/// Builtin keys carry a default folder name, `category` and `supplier`
/// expand dynamically during resolution, `custom` is a free-form folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKey {
    Pd,
    PdChanges,
    Tenders,
    Contracts,
    Realization,
    Ceniky,
    Archive,
    TendersInquiries,
    SupplierEmail,
    SupplierOffer,
    Category,
    Supplier,
    Custom,
}

impl NodeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKey::Pd => "pd",
            NodeKey::PdChanges => "pdChanges",
            NodeKey::Tenders => "tenders",
            NodeKey::Contracts => "contracts",
            NodeKey::Realization => "realization",
            NodeKey::Ceniky => "ceniky",
            NodeKey::Archive => "archive",
            NodeKey::TendersInquiries => "tendersInquiries",
            NodeKey::SupplierEmail => "supplierEmail",
            NodeKey::SupplierOffer => "supplierOffer",
            NodeKey::Category => "category",
            NodeKey::Supplier => "supplier",
            NodeKey::Custom => "custom",
        }
    }

    /// Default folder name for builtin keys; placeholders use a display
    /// label that is never slugified.
    pub fn default_name(&self) -> &'static str {
        match self {
            NodeKey::Pd => "01_PD",
            NodeKey::PdChanges => "02_Zmeny_PD",
            NodeKey::Tenders => "03_Vyberova_rizeni",
            NodeKey::Contracts => "04_Smlouvy",
            NodeKey::Realization => "05_Realizace",
            NodeKey::Ceniky => "06_Ceniky",
            NodeKey::Archive => "99_Archiv",
            NodeKey::TendersInquiries => "Poptavky",
            NodeKey::SupplierEmail => "Email",
            NodeKey::SupplierOffer => "Cenova_nabidka",
            NodeKey::Category => "{Název VŘ}",
            NodeKey::Supplier => "{Název dodavatele}",
            NodeKey::Custom => "Nova_slozka",
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, NodeKey::Category | NodeKey::Supplier)
    }
}

/// One row of the flat, depth-encoded hierarchy template.
///
/// The list is the single source of truth; nesting is implied by `depth`
/// and rebuilt with [`HierarchyTree::build`] before any resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    #[serde(default)]
    pub id: String,
    pub key: NodeKey,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub depth: u32,
}

fn default_enabled() -> bool {
    true
}

impl HierarchyNode {
    pub fn new(key: NodeKey, depth: u32) -> Self {
        Self {
            id: key.as_str().to_string(),
            key,
            name: key.default_name().to_string(),
            enabled: true,
            depth,
        }
    }

    pub fn custom(id: &str, name: &str, depth: u32) -> Self {
        Self {
            id: id.to_string(),
            key: NodeKey::Custom,
            name: name.to_string(),
            enabled: true,
            depth,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// The stock template new projects start from.
pub fn default_hierarchy() -> Vec<HierarchyNode> {
    vec![
        HierarchyNode::new(NodeKey::Pd, 0),
        HierarchyNode::new(NodeKey::PdChanges, 0),
        HierarchyNode::new(NodeKey::Tenders, 0),
        HierarchyNode::new(NodeKey::Category, 1),
        HierarchyNode::custom("dokumentace", "Dokumentace", 2),
        HierarchyNode::new(NodeKey::TendersInquiries, 2),
        HierarchyNode::new(NodeKey::Supplier, 3),
        HierarchyNode::new(NodeKey::Contracts, 0),
        HierarchyNode::new(NodeKey::Realization, 0),
        HierarchyNode::new(NodeKey::Archive, 0),
    ]
}

/// Repairs a template in place; malformed input is clamped, never rejected.
///
/// The first node's depth becomes 0 and every later depth is at most one
/// more than its predecessor's. Missing ids fall back to the key string,
/// or to `item-<index>` for custom rows.
pub fn normalize(nodes: &mut [HierarchyNode]) {
    let mut previous_depth = 0;
    for (index, node) in nodes.iter_mut().enumerate() {
        if node.id.trim().is_empty() {
            node.id = if node.key == NodeKey::Custom {
                format!("item-{index}")
            } else {
                node.key.as_str().to_string()
            };
        }
        let bound = if index == 0 { 0 } else { previous_depth + 1 };
        if node.depth > bound {
            node.depth = bound;
        }
        previous_depth = node.depth;
    }
}

/// Moves a row one level deeper. A no-op (returns false) when the row is
/// first in the list or already at the clamp bound.
pub fn indent(nodes: &mut [HierarchyNode], index: usize) -> bool {
    if index == 0 || index >= nodes.len() {
        return false;
    }
    let bound = nodes[index - 1].depth + 1;
    if nodes[index].depth >= bound {
        return false;
    }
    nodes[index].depth += 1;
    true
}

/// Moves a row one level shallower (floor zero) and re-clamps the rows
/// after it so the encoding stays valid.
pub fn outdent(nodes: &mut [HierarchyNode], index: usize) -> bool {
    if index >= nodes.len() || nodes[index].depth == 0 {
        return false;
    }
    nodes[index].depth -= 1;
    let mut previous_depth = nodes[index].depth;
    for node in nodes.iter_mut().skip(index + 1) {
        let bound = previous_depth + 1;
        if node.depth > bound {
            node.depth = bound;
        }
        previous_depth = node.depth;
    }
    true
}

/// Toggles a row by id. Disabling is pure data: the subtree exclusion
/// happens at resolution time, so re-enabling restores the identical set.
pub fn set_enabled(nodes: &mut [HierarchyNode], id: &str, enabled: bool) -> bool {
    match nodes.iter_mut().find(|node| node.id == id) {
        Some(node) => {
            node.enabled = enabled;
            true
        }
        None => false,
    }
}

/// Explicit tree rebuilt from the flat encoding.
///
/// A node's parent is the nearest preceding node whose depth is exactly one
/// less; depth-0 nodes are roots in list order. `children` and `roots`
/// hold indices into the owned node arena.
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    nodes: Vec<HierarchyNode>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl HierarchyTree {
    /// Builds the tree from a flat list, normalizing a copy first so
    /// unclamped input cannot produce dangling parents.
    pub fn build(nodes: &[HierarchyNode]) -> Self {
        let mut owned = nodes.to_vec();
        normalize(&mut owned);
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); owned.len()];
        let mut roots = Vec::new();
        let mut ancestors: Vec<usize> = Vec::new();
        for (index, node) in owned.iter().enumerate() {
            ancestors.truncate(node.depth as usize);
            match ancestors.last() {
                Some(&parent) => children[parent].push(index),
                None => roots.push(index),
            }
            ancestors.push(index);
        }
        Self {
            nodes: owned,
            children,
            roots,
        }
    }

    pub fn node(&self, index: usize) -> &HierarchyNode {
        &self.nodes[index]
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }
}
