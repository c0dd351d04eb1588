use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hierarchy::{HierarchyNode, HierarchyTree, NodeKey};
use crate::slug::slugify_segment;

/// Tender category a `category` placeholder expands over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub title: String,
}

/// Invited supplier a `supplier` placeholder expands over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
}

/// Suppliers keyed by the category that invited them.
pub type SuppliersByCategory = HashMap<String, Vec<Supplier>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Category,
    Supplier,
}

/// Entity a resolved path was expanded for, inherited by the subtree
/// below the placeholder that introduced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathBinding {
    pub entity_kind: EntityKind,
    pub entity_id: String,
}

/// One concrete folder to materialize. Paths come out in DFS pre-order,
/// so a parent always precedes its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPath {
    pub segments: Vec<String>,
    pub source_node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<PathBinding>,
    #[serde(default)]
    pub duplicate: bool,
}

impl ResolvedPath {
    /// Segments joined with `/`, relative to the sync root.
    pub fn joined(&self) -> String {
        self.segments.join("/")
    }
}

/// Non-fatal configuration findings, surfaced as run log warnings and
/// never raised as failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigWarning {
    #[error(
        "⚠️ Supplier placeholder '{node_id}' is not nested under a category placeholder; it produced no folders"
    )]
    OrphanSupplierPlaceholder { node_id: String },
    #[error("⚠️ Duplicate folders: {path}")]
    DuplicateFolders { path: String },
}

/// Output of hierarchy resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub paths: Vec<ResolvedPath>,
    pub warnings: Vec<ConfigWarning>,
}

struct WalkInput<'a> {
    tree: &'a HierarchyTree,
    categories: &'a [Category],
    suppliers: &'a SuppliersByCategory,
}

/// Expands a hierarchy template against project data into concrete paths.
///
/// Literal nodes contribute one slugified segment. A `category` placeholder
/// repeats its subtree once per category; a `supplier` placeholder repeats
/// once per supplier of the category currently in scope and resolves to
/// nothing (with a warning) when no category scope exists. Disabled nodes
/// drop their whole subtree. Empty category or supplier lists simply
/// produce no paths for that branch.
pub fn resolve(
    hierarchy: &[HierarchyNode],
    categories: &[Category],
    suppliers_by_category: &SuppliersByCategory,
) -> Resolution {
    let tree = HierarchyTree::build(hierarchy);
    let input = WalkInput {
        tree: &tree,
        categories,
        suppliers: suppliers_by_category,
    };
    let mut resolution = Resolution::default();
    for &root in tree.roots() {
        walk(&input, root, &[], None, None, &mut resolution);
    }
    mark_duplicates(&mut resolution);
    resolution
}

fn walk(
    input: &WalkInput<'_>,
    index: usize,
    prefix: &[String],
    binding: Option<&PathBinding>,
    category: Option<&Category>,
    out: &mut Resolution,
) {
    let node = input.tree.node(index);
    if !node.enabled {
        return;
    }
    match node.key {
        NodeKey::Category => {
            for category in input.categories {
                let binding = PathBinding {
                    entity_kind: EntityKind::Category,
                    entity_id: category.id.clone(),
                };
                let path = extend(prefix, slugify_segment(&category.title));
                out.paths.push(ResolvedPath {
                    segments: path.clone(),
                    source_node_id: node.id.clone(),
                    binding: Some(binding.clone()),
                    duplicate: false,
                });
                for &child in input.tree.children(index) {
                    walk(input, child, &path, Some(&binding), Some(category), out);
                }
            }
        }
        NodeKey::Supplier => {
            let Some(category) = category else {
                out.warnings.push(ConfigWarning::OrphanSupplierPlaceholder {
                    node_id: node.id.clone(),
                });
                return;
            };
            let Some(suppliers) = input.suppliers.get(&category.id) else {
                return;
            };
            for supplier in suppliers {
                let binding = PathBinding {
                    entity_kind: EntityKind::Supplier,
                    entity_id: supplier.id.clone(),
                };
                let path = extend(prefix, slugify_segment(&supplier.name));
                out.paths.push(ResolvedPath {
                    segments: path.clone(),
                    source_node_id: node.id.clone(),
                    binding: Some(binding.clone()),
                    duplicate: false,
                });
                for &child in input.tree.children(index) {
                    walk(input, child, &path, Some(&binding), Some(category), out);
                }
            }
        }
        _ => {
            let path = extend(prefix, slugify_segment(&node.name));
            out.paths.push(ResolvedPath {
                segments: path.clone(),
                source_node_id: node.id.clone(),
                binding: binding.cloned(),
                duplicate: false,
            });
            for &child in input.tree.children(index) {
                walk(input, child, &path, binding, category, out);
            }
        }
    }
}

fn extend(prefix: &[String], segment: String) -> Vec<String> {
    let mut path = Vec::with_capacity(prefix.len() + 1);
    path.extend_from_slice(prefix);
    path.push(segment);
    path
}

/// Paths that collapse to the same joined string but come from different
/// source nodes or bindings collide. Every member of a collision group is
/// flagged and the group is reported once, in first-occurrence order.
fn mark_duplicates(resolution: &mut Resolution) {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, path) in resolution.paths.iter().enumerate() {
        groups.entry(path.joined()).or_default().push(index);
    }
    let mut warned: HashSet<String> = HashSet::new();
    for index in 0..resolution.paths.len() {
        let key = resolution.paths[index].joined();
        let Some(members) = groups.get(&key) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        let distinct: HashSet<(&str, Option<&PathBinding>)> = members
            .iter()
            .map(|&member| {
                let path = &resolution.paths[member];
                (path.source_node_id.as_str(), path.binding.as_ref())
            })
            .collect();
        if distinct.len() < 2 {
            continue;
        }
        if warned.insert(key.clone()) {
            for &member in members {
                resolution.paths[member].duplicate = true;
            }
            resolution.warnings.push(ConfigWarning::DuplicateFolders { path: key });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::set_enabled;

    fn scenario_hierarchy() -> Vec<HierarchyNode> {
        vec![
            HierarchyNode::new(NodeKey::Pd, 0),
            HierarchyNode::new(NodeKey::Tenders, 0).named("02_Vyberova_rizeni"),
            HierarchyNode::new(NodeKey::Category, 1),
            HierarchyNode::new(NodeKey::TendersInquiries, 2),
            HierarchyNode::new(NodeKey::Supplier, 3),
        ]
    }

    fn scenario_categories() -> Vec<Category> {
        vec![Category {
            id: "c1".to_string(),
            title: "Zemní práce".to_string(),
        }]
    }

    fn scenario_suppliers() -> SuppliersByCategory {
        SuppliersByCategory::from([(
            "c1".to_string(),
            vec![Supplier {
                id: "s1".to_string(),
                name: "ABC s.r.o.".to_string(),
            }],
        )])
    }

    #[test]
    fn expands_category_and_supplier_placeholders() {
        let resolution = resolve(
            &scenario_hierarchy(),
            &scenario_categories(),
            &scenario_suppliers(),
        );
        let joined: Vec<String> = resolution.paths.iter().map(ResolvedPath::joined).collect();
        assert_eq!(
            joined,
            vec![
                "01_PD",
                "02_Vyberova_rizeni",
                "02_Vyberova_rizeni/Zemni_prace",
                "02_Vyberova_rizeni/Zemni_prace/Poptavky",
                "02_Vyberova_rizeni/Zemni_prace/Poptavky/ABC_s_r_o",
            ]
        );
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn bindings_flow_down_from_placeholders() {
        let resolution = resolve(
            &scenario_hierarchy(),
            &scenario_categories(),
            &scenario_suppliers(),
        );
        assert_eq!(resolution.paths[0].binding, None);
        let category_binding = PathBinding {
            entity_kind: EntityKind::Category,
            entity_id: "c1".to_string(),
        };
        assert_eq!(
            resolution.paths[2].binding.as_ref(),
            Some(&category_binding)
        );
        // the inquiries folder inherits the category scope it lives in
        assert_eq!(
            resolution.paths[3].binding.as_ref(),
            Some(&category_binding)
        );
        assert_eq!(
            resolution.paths[4].binding,
            Some(PathBinding {
                entity_kind: EntityKind::Supplier,
                entity_id: "s1".to_string(),
            })
        );
        assert_eq!(resolution.paths[4].source_node_id, "supplier");
    }

    #[test]
    fn empty_category_list_prunes_the_branch() {
        let resolution = resolve(&scenario_hierarchy(), &[], &SuppliersByCategory::new());
        let joined: Vec<String> = resolution.paths.iter().map(ResolvedPath::joined).collect();
        assert_eq!(joined, vec!["01_PD", "02_Vyberova_rizeni"]);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn missing_supplier_list_yields_no_paths() {
        let resolution = resolve(
            &scenario_hierarchy(),
            &scenario_categories(),
            &SuppliersByCategory::new(),
        );
        assert_eq!(resolution.paths.len(), 4);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn orphan_supplier_placeholder_warns_and_emits_nothing() {
        let hierarchy = vec![
            HierarchyNode::new(NodeKey::Pd, 0),
            HierarchyNode::new(NodeKey::Supplier, 1),
            HierarchyNode::custom("under", "Podklady", 2),
        ];
        let resolution = resolve(&hierarchy, &scenario_categories(), &scenario_suppliers());
        let joined: Vec<String> = resolution.paths.iter().map(ResolvedPath::joined).collect();
        assert_eq!(joined, vec!["01_PD"]);
        assert_eq!(
            resolution.warnings,
            vec![ConfigWarning::OrphanSupplierPlaceholder {
                node_id: "supplier".to_string(),
            }]
        );
    }

    #[test]
    fn disabled_subtree_is_excluded_and_restorable() {
        let mut hierarchy = scenario_hierarchy();
        let full = resolve(&hierarchy, &scenario_categories(), &scenario_suppliers());
        assert!(set_enabled(&mut hierarchy, "category", false));
        let pruned = resolve(&hierarchy, &scenario_categories(), &scenario_suppliers());
        let joined: Vec<String> = pruned.paths.iter().map(ResolvedPath::joined).collect();
        assert_eq!(joined, vec!["01_PD", "02_Vyberova_rizeni"]);
        assert!(set_enabled(&mut hierarchy, "category", true));
        let restored = resolve(&hierarchy, &scenario_categories(), &scenario_suppliers());
        assert_eq!(restored.paths, full.paths);
    }

    #[test]
    fn category_cardinality_multiplies_the_subtree() {
        let hierarchy = vec![
            HierarchyNode::new(NodeKey::Tenders, 0),
            HierarchyNode::new(NodeKey::Category, 1),
            HierarchyNode::custom("docs", "Dokumentace", 2),
            HierarchyNode::new(NodeKey::TendersInquiries, 2),
        ];
        let categories = vec![
            Category {
                id: "c1".to_string(),
                title: "Zemní práce".to_string(),
            },
            Category {
                id: "c2".to_string(),
                title: "Elektro".to_string(),
            },
            Category {
                id: "c3".to_string(),
                title: "Střecha".to_string(),
            },
        ];
        let resolution = resolve(&hierarchy, &categories, &SuppliersByCategory::new());
        // one tenders root plus 3 x (category + two children)
        assert_eq!(resolution.paths.len(), 1 + 3 * 3);
    }

    #[test]
    fn sibling_slug_collisions_are_flagged_once_per_group() {
        let hierarchy = vec![
            HierarchyNode::custom("a", "Výkresy", 0),
            HierarchyNode::custom("b", "Vykresy!", 0),
            HierarchyNode::custom("c", "Ostatni", 0),
        ];
        let resolution = resolve(&hierarchy, &[], &SuppliersByCategory::new());
        assert!(resolution.paths[0].duplicate);
        assert!(resolution.paths[1].duplicate);
        assert!(!resolution.paths[2].duplicate);
        assert_eq!(
            resolution.warnings,
            vec![ConfigWarning::DuplicateFolders {
                path: "Vykresy".to_string(),
            }]
        );
    }

    #[test]
    fn colliding_category_titles_collide_via_bindings() {
        let hierarchy = vec![
            HierarchyNode::new(NodeKey::Tenders, 0),
            HierarchyNode::new(NodeKey::Category, 1),
        ];
        let categories = vec![
            Category {
                id: "c1".to_string(),
                title: "Zemní práce".to_string(),
            },
            Category {
                id: "c2".to_string(),
                title: "Zemni prace".to_string(),
            },
        ];
        let resolution = resolve(&hierarchy, &categories, &SuppliersByCategory::new());
        assert_eq!(resolution.paths.len(), 3);
        assert!(resolution.paths[1].duplicate);
        assert!(resolution.paths[2].duplicate);
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn warning_text_matches_the_run_log_format() {
        let duplicate = ConfigWarning::DuplicateFolders {
            path: "03_Vyberova_rizeni/Zemni_prace".to_string(),
        };
        assert_eq!(
            duplicate.to_string(),
            "⚠️ Duplicate folders: 03_Vyberova_rizeni/Zemni_prace"
        );
        let orphan = ConfigWarning::OrphanSupplierPlaceholder {
            node_id: "supplier".to_string(),
        };
        assert_eq!(
            orphan.to_string(),
            "⚠️ Supplier placeholder 'supplier' is not nested under a category placeholder; it produced no folders"
        );
    }
}
