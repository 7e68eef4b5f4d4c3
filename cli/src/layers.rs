use archgen_config::LayersConfig;
use archgen_core::{discover_layers, ConfigurationLayer, LayerKind};

/// Per-kind file paths win; otherwise the layer comes from the directory.
/// Every returned layer has been loaded.
pub fn build_layers(layers: &LayersConfig) -> Vec<ConfigurationLayer> {
    let discovered = layers
        .dir_path()
        .map(|dir| discover_layers(&dir))
        .unwrap_or_default();

    LayerKind::ALL
        .iter()
        .filter_map(|kind| {
            layers.path_for(*kind).map_or_else(
                || discovered.iter().find(|layer| layer.kind() == *kind).cloned(),
                |path| Some(ConfigurationLayer::from_file(*kind, path)),
            )
        })
        .map(ConfigurationLayer::loaded)
        .collect()
}
