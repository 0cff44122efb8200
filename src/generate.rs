use std::path::Path;

use log::{debug, info, trace};

use crate::{
    config::Config,
    dts::DeviceTree,
    error::Result,
    parse_file::{write_file, write_stdout},
    sources::{compatibles, Filesystem, Resolver, SearchPath, Sources, COMPATIBLE, DRIVER_DIRS, EXTENSIONS},
};

/// Read the devicetree, find its driver sources and write the rendered list.
pub fn run(config: &Config) -> Result<()> {
    let template = config.layout.template(config.templates.as_deref())?;
    info!("Generating source list with {} layout", config.layout);
    if !config.features.is_empty() {
        debug!("features requested: {}", config.features.join(", "));
    }

    let tree = DeviceTree::load(&config.dts, &config.include_dirs)?;
    if let Some(path) = &config.dump_tree {
        write_file(path, &serde_json::to_string_pretty(&tree)?)?;
    }

    let sources = find_sources(&tree, &config.metal);
    report(&sources);

    let text = template.render(&serde_json::to_value(&sources)?)?;
    match &config.output {
        Some(path) => write_file(path, &text),
        None => write_stdout(&text),
    }
}

/// Sources for every compatible node, searched below the library root, sorted.
pub fn find_sources(tree: &DeviceTree, metal: &Path) -> Sources {
    for (path, node) in tree.walk() {
        if let Some(prop) = node.prop(COMPATIBLE) {
            trace!("{path}: {prop}");
        }
    }
    let search = SearchPath::under(metal, &DRIVER_DIRS);
    Resolver::new(&search, &EXTENSIONS, Filesystem)
        .resolve(compatibles(&tree.root))
        .sorted()
}

fn report(sources: &Sources) {
    info!("Using {} sources:", sources.len());
    for path in sources.c.iter().chain(sources.asm.iter()) {
        info!("\t{path}");
    }
}
