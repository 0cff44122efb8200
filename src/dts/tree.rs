use std::path::{Path as FilePath, PathBuf};

use log::debug;
use serde::Serialize;

use super::*;
use crate::{
    error::{Error, Result},
    parse_file::{parse_with, read_file},
};

/// A device tree assembled from one or more source files.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceTree {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reserved: Vec<(Address, Address)>,
    pub root: Node,
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self {
            reserved: Vec::new(),
            root: Node::new(NodeName::root()),
        }
    }
}

impl DeviceTree {
    /// Read a device tree source file, following its includes.
    pub fn load(path: &FilePath, include_dirs: &[PathBuf]) -> Result<Self> {
        let mut tree = Self::default();
        Loader::new(include_dirs).load(&mut tree, path)?;
        Ok(tree)
    }

    /// Build a tree from source text. Includes resolve against `origin`'s directory.
    pub fn from_source(text: &str, origin: &FilePath, include_dirs: &[PathBuf]) -> Result<Self> {
        let mut tree = Self::default();
        Loader::new(include_dirs).load_text(&mut tree, text, origin)?;
        Ok(tree)
    }

    /// Apply one top level item that is not an include.
    pub fn apply(&mut self, item: Item) -> Result<()> {
        match item {
            Item::Version | Item::Plugin | Item::Include(_) => (),
            Item::MemReserve(address, size) => self.reserved.push((address, size)),
            Item::Fragment(fragment) => {
                let target = match &fragment.name {
                    NodeName::Reference(label) => self
                        .root
                        .find_label_mut(label)
                        .ok_or_else(|| Error::UndefinedLabel(label.clone()))?,
                    NodeName::PathReference(path) => self
                        .node_at_mut(path)
                        .ok_or_else(|| Error::UndefinedPath(path.clone()))?,
                    NodeName::Symbol(..) => &mut self.root,
                };
                target.merge(fragment)
            }
            Item::DeleteNode(NodeName::Reference(label)) => {
                if !self.root.remove_labelled(&label) {
                    return Err(Error::UndefinedLabel(label));
                }
            }
            Item::DeleteNode(NodeName::PathReference(path)) => {
                let (parent, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
                let parent = self
                    .node_at_mut(parent)
                    .ok_or_else(|| Error::UndefinedPath(path.clone()))?;
                let before = parent.nodes.len();
                parent.nodes.retain(|n| n.name.to_string() != name);
                if before == parent.nodes.len() {
                    return Err(Error::UndefinedPath(path));
                }
            }
            Item::DeleteNode(name) => self.root.nodes.retain(|n| n.name != name),
        }
        Ok(())
    }

    /// All nodes in depth first pre-order, with their paths.
    pub fn walk(&self) -> Vec<(Path, &Node)> {
        fn visit<'a>(path: Path, node: &'a Node, found: &mut Vec<(Path, &'a Node)>) {
            for child in node.nodes.iter() {
                let path = path.clone().join([child.name.clone()]);
                found.push((path.clone(), child));
                visit(path, child, found)
            }
        }

        let mut found = vec![(Path::root(), &self.root)];
        visit(Path::root(), &self.root, &mut found);
        found
    }

    /// The node at an absolute path such as `/soc/serial@10013000`.
    pub fn node_at_mut(&mut self, path: &str) -> Option<&mut Node> {
        path.split('/')
            .filter(|name| !name.is_empty())
            .try_fold(&mut self.root, |node, name| {
                node.nodes.iter_mut().find(|n| n.name.to_string() == name)
            })
    }

    pub fn node_at(&self, path: &str) -> Option<&Node> {
        self.walk()
            .into_iter()
            .find(|(p, _)| p.to_string() == path)
            .map(|(_, n)| n)
    }
}

/// Reads source files into a tree, splicing includes in place.
struct Loader<'a> {
    include_dirs: &'a [PathBuf],
    stack: Vec<PathBuf>,
}

impl<'a> Loader<'a> {
    fn new(include_dirs: &'a [PathBuf]) -> Self {
        Self {
            include_dirs,
            stack: Vec::new(),
        }
    }

    fn load(&mut self, tree: &mut DeviceTree, path: &FilePath) -> Result<()> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.stack.contains(&key) {
            return Err(Error::IncludeCycle {
                path: path.to_path_buf(),
            });
        }
        debug!("reading devicetree {}", path.display());
        let text = read_file(path)?;
        self.stack.push(key);
        let loaded = self.load_text(tree, &text, path);
        self.stack.pop();
        loaded
    }

    fn load_text(&mut self, tree: &mut DeviceTree, text: &str, origin: &FilePath) -> Result<()> {
        let items = parse_with(text, parser::source).map_err(|detail| Error::Syntax {
            path: origin.to_path_buf(),
            detail,
        })?;
        for item in items {
            match item {
                Item::Include(include) => {
                    if let Some(path) = self.resolve(&include, origin)? {
                        self.load(tree, &path)?
                    }
                }
                item => tree.apply(item)?,
            }
        }
        Ok(())
    }

    /// Locate an included file. C headers only matter to the preprocessor and are skipped.
    fn resolve(&self, include: &Include, origin: &FilePath) -> Result<Option<PathBuf>> {
        let (name, local) = match include {
            Include::Quoted(name) => (name, origin.parent()),
            Include::System(name) => (name, None),
        };
        if name.ends_with(".h") {
            debug!("skipping header {name}");
            return Ok(None);
        }
        local
            .into_iter()
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .map(Some)
            .ok_or_else(|| Error::IncludeNotFound {
                from: origin.to_path_buf(),
                name: name.clone(),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sources::DeviceNode;
    use std::fs;

    const BOARD: &str = r#"
/dts-v1/;
/ {
    #address-cells = <1>;
    compatible = "sifive,hifive1-revb";
    cpus {
        cpu0: cpu@0 {
            compatible = "sifive,e31", "riscv";
            device_type = "cpu";
        };
    };
    soc {
        uart0: serial@10013000 {
            compatible = "sifive,uart0";
            status = "disabled";
        };
        spi0: spi@10014000 {
            compatible = "sifive,spi0";
        };
    };
};
&uart0 {
    status = "okay";
};
/delete-node/ &spi0;
"#;

    fn tree(text: &str) -> DeviceTree {
        DeviceTree::from_source(text, FilePath::new("board.dts"), &[]).unwrap()
    }

    #[test]
    fn walk_order_test() {
        let tree = tree(BOARD);
        let paths: Vec<String> = tree.walk().iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            paths,
            ["/", "/cpus", "/cpus/cpu@0", "/soc", "/soc/serial@10013000"]
        );
    }

    #[test]
    fn label_merge_test() {
        let tree = tree(BOARD);
        let serial = tree.node_at("/soc/serial@10013000").unwrap();
        assert_eq!(serial.fields("status"), Some(["okay"].into()));
        assert_eq!(serial.props.len(), 2);
    }

    #[test]
    fn undefined_label_test() {
        let result = DeviceTree::from_source("/ {}; &nothing { x; };", FilePath::new("x.dts"), &[]);
        assert!(matches!(result, Err(Error::UndefinedLabel(Symbol(s))) if s == "nothing"));
    }

    #[test]
    fn path_reference_test() {
        let text = r#"
/dts-v1/;
/ {
    soc {
        spi@10014000 { compatible = "sifive,spi0"; };
    };
};
&{/soc} {
    serial@10013000 { compatible = "sifive,uart0"; };
};
/delete-node/ &{/soc/spi@10014000};
"#;
        let tree = tree(text);
        let soc = tree.node_at("/soc").unwrap();
        assert_eq!(soc.nodes.len(), 1);
        let serial = tree.node_at("/soc/serial@10013000").unwrap();
        assert_eq!(serial.fields("compatible"), Some(["sifive,uart0"].into()));
    }

    #[test]
    fn undefined_path_test() {
        let result = DeviceTree::from_source("/ {}; &{/soc} { x; };", FilePath::new("x.dts"), &[]);
        assert!(matches!(result, Err(Error::UndefinedPath(p)) if p == "/soc"));

        let result = DeviceTree::from_source("/ { soc {}; }; /delete-node/ &{/soc/spi};", FilePath::new("x.dts"), &[]);
        assert!(matches!(result, Err(Error::UndefinedPath(p)) if p == "/soc/spi"));
    }

    #[test]
    fn syntax_error_test() {
        let result = DeviceTree::from_source("/ { x = ; };", FilePath::new("bad.dts"), &[]);
        assert!(matches!(result, Err(Error::Syntax { .. })));
    }

    #[test]
    fn include_test() {
        let dir = std::env::temp_dir().join(format!("metal-depend-include-{}", std::process::id()));
        let common = dir.join("common");
        fs::create_dir_all(&common).unwrap();
        fs::write(
            common.join("soc.dtsi"),
            "/ { soc { uart0: serial@0 { compatible = \"sifive,uart0\"; }; }; };",
        )
        .unwrap();
        fs::write(
            dir.join("board.dts"),
            "/dts-v1/;\n#include <dt-bindings/gpio/gpio.h>\n#include \"soc.dtsi\"\n&uart0 { device_type = \"serial\"; };\n",
        )
        .unwrap();

        let missing = DeviceTree::load(&dir.join("board.dts"), &[]);
        assert!(matches!(missing, Err(Error::IncludeNotFound { .. })));

        let tree = DeviceTree::load(&dir.join("board.dts"), &[common]).unwrap();
        let serial = tree.node_at("/soc/serial@0").unwrap();
        assert_eq!(serial.fields("compatible"), Some(["sifive,uart0"].into()));
        assert_eq!(serial.fields("device_type"), Some(["serial"].into()));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn include_cycle_test() {
        let dir = std::env::temp_dir().join(format!("metal-depend-cycle-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.dtsi"), "/include/ \"b.dtsi\"\n").unwrap();
        fs::write(dir.join("b.dtsi"), "/include/ \"a.dtsi\"\n").unwrap();

        let result = DeviceTree::load(&dir.join("a.dtsi"), &[]);
        assert!(matches!(result, Err(Error::IncludeCycle { .. })));

        fs::remove_dir_all(&dir).unwrap();
    }
}
