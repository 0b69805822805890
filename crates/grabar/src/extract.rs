//! Locator extraction with a deterministic priority scheme.
//!
//! `extract` never fails: it walks the tiers from strongest signal to the
//! spatial fallback and returns the first one that resolves *uniquely* in the
//! snapshot. An ambiguous tier demotes to the next one; there is no
//! backtracking once a tier has been accepted, so extraction is deterministic
//! for a given snapshot.

use serde::{Deserialize, Serialize};

use crate::dom::{DomSnapshot, NodeId};
use crate::locator::{LocatorDefinition, LocatorMetadata, Strategy};

/// Attribute names the extractor treats as stable domain signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Domain-specific stable control attribute (tier 1)
    pub control_attribute: String,
    /// Domain-specific menu/navigation text attribute (tier 2)
    pub menu_attribute: String,
    /// Container attribute anchoring the spatial fallback (tier 6)
    pub container_attribute: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            control_attribute: "data-dyn-controlname".to_string(),
            menu_attribute: "data-menu-text".to_string(),
            container_attribute: "data-region".to_string(),
        }
    }
}

/// Tiered locator extractor
#[derive(Debug, Clone, Default)]
pub struct LocatorExtractor {
    config: ExtractorConfig,
}

impl LocatorExtractor {
    /// Create an extractor with the default attribute scheme
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with a custom attribute scheme
    #[must_use]
    pub const fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Produce a locator for the target element. Infallible: the spatial
    /// fallback is always available at the lowest confidence.
    #[must_use]
    pub fn extract(&self, snapshot: &DomSnapshot, target: NodeId) -> LocatorDefinition {
        let identity = self.identity_of(snapshot, target);
        let accessible_name = snapshot.accessible_name_of(target);

        if let Some(def) = self.try_attribute_tier(
            snapshot,
            target,
            &self.config.control_attribute,
            1.0,
            &identity,
            accessible_name.as_deref(),
        ) {
            return def;
        }
        if let Some(def) = self.try_attribute_tier(
            snapshot,
            target,
            &self.config.menu_attribute,
            0.9,
            &identity,
            accessible_name.as_deref(),
        ) {
            return def;
        }
        if let Some(def) = Self::try_role_tier(snapshot, target, &identity) {
            return def;
        }
        if let Some(def) = Self::try_label_tier(snapshot, target, &identity) {
            return def;
        }
        if let Some(def) = Self::try_text_tier(snapshot, target, &identity) {
            return def;
        }
        self.spatial_fallback(snapshot, target, &identity, accessible_name)
    }

    /// Identity inputs for the locator key: the strongest stable signal the
    /// element carries, whether or not that signal wins the tier walk.
    fn identity_of(&self, snapshot: &DomSnapshot, target: NodeId) -> String {
        let node = snapshot.node(target);
        if let Some(value) = node.attribute(&self.config.control_attribute) {
            return format!("control:{value}");
        }
        if let Some(value) = node.attribute(&self.config.menu_attribute) {
            return format!("menu:{value}");
        }
        if let Some(value) = node.attribute("id") {
            return format!("id:{value}");
        }
        if let Some(role) = snapshot.role_of(target) {
            if let Some(name) = snapshot.accessible_name_of(target) {
                return format!("role:{role}:{name}");
            }
        }
        format!("path:{}:{}", snapshot.url, snapshot.xpath_of(target))
    }

    fn try_attribute_tier(
        &self,
        snapshot: &DomSnapshot,
        target: NodeId,
        attribute: &str,
        confidence: f64,
        identity: &str,
        accessible_name: Option<&str>,
    ) -> Option<LocatorDefinition> {
        let value = snapshot.node(target).attribute(attribute)?;
        let matches = snapshot.nodes_with_attribute(attribute, value);
        if matches != vec![target] {
            tracing::debug!(attribute, value, hits = matches.len(), "ambiguous attribute tier, demoting");
            return None;
        }
        Some(LocatorDefinition::new(
            Strategy::Attribute,
            value,
            LocatorMetadata {
                attribute_name: Some(attribute.to_string()),
                role_name: None,
                accessible_name: accessible_name.map(str::to_string),
                confidence,
            },
            identity,
        ))
    }

    fn try_role_tier(
        snapshot: &DomSnapshot,
        target: NodeId,
        identity: &str,
    ) -> Option<LocatorDefinition> {
        let role = snapshot.role_of(target)?;
        let name = snapshot.accessible_name_of(target)?;
        let matches = snapshot.nodes_with_role_and_name(&role, &name);
        if matches != vec![target] {
            return None;
        }
        Some(LocatorDefinition::new(
            Strategy::Role,
            name.clone(),
            LocatorMetadata {
                attribute_name: None,
                role_name: Some(role),
                accessible_name: Some(name),
                confidence: 0.7,
            },
            identity,
        ))
    }

    fn try_label_tier(
        snapshot: &DomSnapshot,
        target: NodeId,
        identity: &str,
    ) -> Option<LocatorDefinition> {
        let label = snapshot.label_text_for(target)?;
        let matches = snapshot.nodes_with_label(&label);
        if matches != vec![target] {
            return None;
        }
        Some(LocatorDefinition::new(
            Strategy::Label,
            label.clone(),
            LocatorMetadata {
                attribute_name: None,
                role_name: None,
                accessible_name: Some(label),
                confidence: 0.6,
            },
            identity,
        ))
    }

    fn try_text_tier(
        snapshot: &DomSnapshot,
        target: NodeId,
        identity: &str,
    ) -> Option<LocatorDefinition> {
        let text = snapshot.node(target).text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let matches = snapshot.nodes_with_text(&text);
        if matches != vec![target] {
            return None;
        }
        Some(LocatorDefinition::new(
            Strategy::Text,
            text.clone(),
            LocatorMetadata {
                attribute_name: None,
                role_name: None,
                accessible_name: Some(text),
                confidence: 0.4,
            },
            identity,
        ))
    }

    /// Tier 6: positional path, anchored to a known container when one
    /// encloses the target
    fn spatial_fallback(
        &self,
        snapshot: &DomSnapshot,
        target: NodeId,
        identity: &str,
        accessible_name: Option<String>,
    ) -> LocatorDefinition {
        let xpath = snapshot.xpath_of(target);
        let value = snapshot
            .ancestor_with_attribute(target, &self.config.container_attribute)
            .and_then(|container| {
                snapshot
                    .node(container)
                    .attribute(&self.config.container_attribute)
                    .map(|region| format!("{region}::{xpath}"))
            })
            .unwrap_or(xpath);
        tracing::debug!(%value, "no stable tier matched, using spatial fallback");
        LocatorDefinition::new(
            Strategy::Spatial,
            value,
            LocatorMetadata {
                attribute_name: None,
                role_name: None,
                accessible_name,
                confidence: 0.2,
            },
            identity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomNode;

    fn snapshot_with(nodes: Vec<DomNode>) -> (DomSnapshot, Vec<NodeId>) {
        let mut snapshot = DomSnapshot::new("https://erp.example/page", "Page");
        let root = snapshot.root();
        let ids = nodes
            .into_iter()
            .map(|node| snapshot.add_node(root, node))
            .collect();
        (snapshot, ids)
    }

    mod tier_tests {
        use super::*;

        #[test]
        fn test_control_attribute_wins() {
            let (snapshot, ids) = snapshot_with(vec![DomNode::new("input")
                .with_attribute("data-dyn-controlname", "CustomerAccount")
                .with_attribute("role", "combobox")
                .with_attribute("aria-label", "Customer account")]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            assert_eq!(def.strategy, Strategy::Attribute);
            assert_eq!(def.value, "CustomerAccount");
            assert_eq!(def.metadata.confidence, 1.0);
            assert_eq!(
                def.metadata.attribute_name.as_deref(),
                Some("data-dyn-controlname")
            );
        }

        #[test]
        fn test_falls_to_role_without_attribute() {
            let (snapshot, ids) = snapshot_with(vec![DomNode::new("input")
                .with_attribute("role", "combobox")
                .with_attribute("aria-label", "Customer account")]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            assert_eq!(def.strategy, Strategy::Role);
            assert_eq!(def.value, "Customer account");
            assert_eq!(def.metadata.role_name.as_deref(), Some("combobox"));
            assert_eq!(def.metadata.confidence, 0.7);
        }

        #[test]
        fn test_menu_attribute_tier() {
            let (snapshot, ids) = snapshot_with(vec![DomNode::new("a")
                .with_attribute("data-menu-text", "Accounts receivable")]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            assert_eq!(def.strategy, Strategy::Attribute);
            assert_eq!(def.metadata.confidence, 0.9);
            assert_eq!(def.metadata.attribute_name.as_deref(), Some("data-menu-text"));
        }

        #[test]
        fn test_label_tier() {
            let mut snapshot = DomSnapshot::new("u", "t");
            let root = snapshot.root();
            snapshot.add_node(
                root,
                DomNode::new("label")
                    .with_attribute("for", "qty")
                    .with_text("Quantity"),
            );
            let field = snapshot.add_node(root, DomNode::new("span").with_attribute("id", "qty"));
            let def = LocatorExtractor::new().extract(&snapshot, field);
            assert_eq!(def.strategy, Strategy::Label);
            assert_eq!(def.value, "Quantity");
            assert_eq!(def.metadata.confidence, 0.6);
        }

        #[test]
        fn test_text_tier() {
            let (snapshot, ids) = snapshot_with(vec![DomNode::new("span").with_text("Post invoice")]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            assert_eq!(def.strategy, Strategy::Text);
            assert_eq!(def.value, "Post invoice");
            assert_eq!(def.metadata.confidence, 0.4);
        }

        #[test]
        fn test_spatial_fallback() {
            let (snapshot, ids) = snapshot_with(vec![DomNode::new("div")]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            assert_eq!(def.strategy, Strategy::Spatial);
            assert_eq!(def.metadata.confidence, 0.2);
            assert!(def.value.contains("/div[1]"));
            assert!(def.is_low_confidence());
        }

        #[test]
        fn test_spatial_fallback_anchored_to_container() {
            let mut snapshot = DomSnapshot::new("u", "t");
            let root = snapshot.root();
            let rail = snapshot.add_node(
                root,
                DomNode::new("nav").with_attribute("data-region", "navigation-rail"),
            );
            let item = snapshot.add_node(rail, DomNode::new("div"));
            let def = LocatorExtractor::new().extract(&snapshot, item);
            assert_eq!(def.strategy, Strategy::Spatial);
            assert!(def.value.starts_with("navigation-rail::"));
        }
    }

    mod uniqueness_tests {
        use super::*;

        #[test]
        fn test_ambiguous_attribute_demotes() {
            let (snapshot, ids) = snapshot_with(vec![
                DomNode::new("input")
                    .with_attribute("data-dyn-controlname", "Amount")
                    .with_attribute("aria-label", "Line amount"),
                DomNode::new("input").with_attribute("data-dyn-controlname", "Amount"),
            ]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            // Tier 1 is ambiguous, role+name is unique.
            assert_eq!(def.strategy, Strategy::Role);
        }

        #[test]
        fn test_ambiguous_everything_falls_to_spatial() {
            let (snapshot, ids) = snapshot_with(vec![
                DomNode::new("span").with_text("10"),
                DomNode::new("span").with_text("10"),
            ]);
            let def = LocatorExtractor::new().extract(&snapshot, ids[0]);
            assert_eq!(def.strategy, Strategy::Spatial);
        }

        #[test]
        fn test_key_survives_demotion() {
            // Same element identity hashes identically whether tier 1 wins or
            // demotes to role: the key comes from identity, not the strategy.
            let (unique, unique_ids) = snapshot_with(vec![DomNode::new("input")
                .with_attribute("data-dyn-controlname", "Amount")
                .with_attribute("aria-label", "Line amount")]);
            let (dup, dup_ids) = snapshot_with(vec![
                DomNode::new("input")
                    .with_attribute("data-dyn-controlname", "Amount")
                    .with_attribute("aria-label", "Line amount"),
                DomNode::new("input").with_attribute("data-dyn-controlname", "Amount"),
            ]);
            let extractor = LocatorExtractor::new();
            let a = extractor.extract(&unique, unique_ids[0]);
            let b = extractor.extract(&dup, dup_ids[0]);
            assert_ne!(a.strategy, b.strategy);
            assert_eq!(a.locator_key, b.locator_key);
        }
    }
}
