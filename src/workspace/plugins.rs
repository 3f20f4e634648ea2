//! Plugin libraries and what they contribute: decoders and plots.
//!
//! A plugin node owns its [`PluginHandle`]; deleting the node unloads the
//! library, even during shutdown. The subtree is
//! `PlugIn → {Decoders → Decoder*, Plots → Plot → SubPlot → Graph | SequenceDiagram}`.

use super::Workspace;
use crate::host::PluginLoadError;
use crate::models::PluginHandle;
use crate::tree::{CfgNode, ItemKind, ItemStatus, NodeId, Payload};
use camino::Utf8Path;

impl Workspace {
    pub fn plugin_nodes(&self) -> Vec<NodeId> {
        self.tree.children(self.plugins).to_vec()
    }

    /// Add a loaded plugin with its decoders and plots
    pub fn add_plugin(&mut self, handle: PluginHandle) -> NodeId {
        let plugins = self.plugins;
        let decoders = handle.decoders.clone();
        let plots = handle.plots.clone();
        tracing::info!(
            "Adding plugin {} ({} decoders, {} plots)",
            handle.info.name,
            decoders.len(),
            plots.len()
        );

        let name = handle.info.name.clone();
        let plugin = self.insert_node(
            CfgNode::new(ItemKind::PlugIn, name, Payload::Plugin(handle)),
            plugins,
            None,
            false,
        );
        self.set_status_bit(plugins, ItemStatus::DISABLED, false);

        if !decoders.is_empty() {
            let root = self.insert_node(CfgNode::container(ItemKind::DecoderRoot, "Decoders"), plugin, None, false);
            for decoder in &decoders {
                self.insert_node(
                    CfgNode::new(ItemKind::Decoder, decoder.as_str(), Payload::Decoder { name: decoder.clone() }),
                    root,
                    None,
                    false,
                );
            }
            self.host.document.add_decoders(&decoders);
            self.host.document.clean_row_cache();
        }

        if !plots.is_empty() {
            let root = self.insert_node(
                CfgNode::new(ItemKind::PlotRoot, "Plots", Payload::Empty),
                plugin,
                None,
                false,
            );
            for plot in &plots {
                let plot_id = self.insert_node(
                    CfgNode::new(ItemKind::Plot, plot.name.as_str(), Payload::Plot { name: plot.name.clone() }),
                    root,
                    None,
                    false,
                );
                for sub in &plot.subplots {
                    self.insert_node(
                        CfgNode::new(
                            ItemKind::SubPlot,
                            sub.name.as_str(),
                            Payload::SubPlot {
                                name: sub.name.clone(),
                                sequence: sub.sequence,
                            },
                        ),
                        plot_id,
                        None,
                        false,
                    );
                }
            }
        }

        plugin
    }

    /// Load a plugin library through the host and add it
    pub fn load_plugin(&mut self, path: &Utf8Path) -> Result<NodeId, PluginLoadError> {
        let handle = self.host.plugins.load_library(path)?;
        Ok(self.add_plugin(handle))
    }

    /// Plugin node loaded from `path`
    pub fn find_plugin(&self, path: &Utf8Path) -> Option<NodeId> {
        self.tree
            .find_child(self.plugins, |node| node.plugin().is_some_and(|p| p.path() == path))
    }

    pub fn close_all_plugins(&mut self) {
        let plugins = self.plugins;
        self.remove_all_children(plugins);
        self.host.document.plugin_unloaded();
    }

    /// Delete the selected plugins, last selected first
    pub fn close_all_selected_plugins(&mut self) {
        let selected = self.selection(Some(ItemKind::PlugIn));
        if selected.is_empty() {
            return;
        }
        for id in selected.into_iter().rev() {
            self.delete_item(id);
        }
        self.host.document.plugin_unloaded();
    }

    fn owning_plugin(&self, id: NodeId) -> Option<&PluginHandle> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.tree.get(node_id)?;
            if let Some(handle) = node.plugin() {
                return Some(handle);
            }
            current = node.parent();
        }
        None
    }

    /// Run one plot and show the produced graphs below its sub-plots
    pub fn run_plot(&mut self, plot: NodeId) -> bool {
        let Some(Payload::Plot { name }) = self.tree.get(plot).map(|n| n.payload.clone()) else {
            tracing::warn!("Run plot: {} is not a plot", plot);
            return false;
        };
        let Some(handle) = self.owning_plugin(plot).cloned() else {
            tracing::error!("Run plot: plot {} has no plugin", name);
            return false;
        };

        let subplots: Vec<NodeId> = self.tree.children(plot).to_vec();
        for sub in &subplots {
            self.remove_all_children(*sub);
        }

        let graphs = self.host.plugins.run_plot(&handle, &name);
        for (sub, names) in subplots.iter().zip(graphs) {
            let sequence = matches!(
                self.tree.get(*sub).map(|n| &n.payload),
                Some(Payload::SubPlot { sequence: true, .. })
            );
            for graph in names {
                let node = if sequence {
                    CfgNode::new(
                        ItemKind::SequenceDiagram,
                        graph.as_str(),
                        Payload::SequenceDiagram {
                            name: graph.clone(),
                            enabled: true,
                        },
                    )
                } else {
                    CfgNode::new(
                        ItemKind::Graph,
                        graph.as_str(),
                        Payload::Graph {
                            name: graph.clone(),
                            enabled: true,
                        },
                    )
                };
                self.insert_node(node, *sub, None, false);
            }
        }
        tracing::info!("Ran plot {}", name);
        true
    }

    /// Run every plot at or below `node`, each one once
    pub fn run_all_plots(&mut self, node: NodeId) -> usize {
        let mut plots: Vec<NodeId> = Vec::new();
        for id in std::iter::once(node).chain(self.tree.descendants(node)) {
            if self.tree.kind(id) == Some(ItemKind::Plot) && !plots.contains(&id) {
                plots.push(id);
            }
        }
        plots.into_iter().filter(|plot| self.run_plot(*plot)).count()
    }

    /// Description of the plugin owning `node`
    pub fn plugin_info_text(&self, node: NodeId) -> Option<String> {
        self.owning_plugin(node).map(|handle| handle.info.describe())
    }

    /// Show or hide graphs and sequence diagrams
    pub fn set_graphs_enabled(&mut self, nodes: &[NodeId], on: bool) {
        for id in nodes {
            let Some(node) = self.tree.get_mut(*id) else {
                continue;
            };
            match &mut node.payload {
                Payload::Graph { enabled, .. } | Payload::SequenceDiagram { enabled, .. } => *enabled = on,
                _ => continue,
            }
            self.set_status_bit(*id, ItemStatus::DISABLED, !on);
        }
    }

    pub(crate) fn graph_enabled(&self, id: NodeId) -> Option<bool> {
        match self.tree.get(id).map(|n| &n.payload) {
            Some(Payload::Graph { enabled, .. }) | Some(Payload::SequenceDiagram { enabled, .. }) => Some(*enabled),
            _ => None,
        }
    }
}
