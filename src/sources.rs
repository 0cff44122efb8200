//! Matching device tree nodes to driver sources.
//!
//! Every node with a `compatible` property names candidate source files:
//! each compatible string, alone and suffixed with each `device_type`,
//! with commas replaced by underscores. Candidates are looked up in an
//! ordered list of driver directories, first match wins.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

pub const COMPATIBLE: &str = "compatible";
pub const DEVICE_TYPE: &str = "device_type";

/// Driver directories below the library root, in search order.
pub const DRIVER_DIRS: [&str; 2] = ["src", "src/drivers"];

/// Source extensions, in lookup order.
pub const EXTENSIONS: [Extension; 2] = [Extension::C, Extension::Asm];

/// Field access on a device tree node.
pub trait DeviceNode {
    /// All string values of a field, in declaration order.
    /// `None` when the field is absent or holds no strings.
    fn fields(&self, name: &str) -> Option<Vec<&str>>;

    fn children(&self) -> &[Self]
    where
        Self: Sized;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    C,
    Asm,
}

impl Extension {
    pub fn suffix(self) -> &'static str {
        match self {
            Extension::C => ".c",
            Extension::Asm => ".S",
        }
    }
}

/// A resolved source file. Compared and sorted as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SourcePath(String);

impl SourcePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Path> for SourcePath {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl Display for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The ordered directories searched for each candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath(Vec<PathBuf>);

impl SearchPath {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self(dirs.into_iter().collect())
    }

    /// Subdirectories of a library root, in the given order.
    pub fn under(root: &Path, subdirs: &[&str]) -> Self {
        Self::new(subdirs.iter().map(|sub| root.join(sub)))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.0
    }
}

/// Existence probe for candidate files.
pub trait Locator {
    fn exists(&self, path: &Path) -> bool;

    /// The first directory holding `filename`, joined with it.
    fn locate(&self, filename: &str, search: &SearchPath) -> Option<SourcePath> {
        search
            .dirs()
            .iter()
            .map(|dir| dir.join(filename))
            .find(|path| self.exists(path))
            .map(|path| SourcePath::from(path.as_path()))
    }
}

impl<F> Locator for F
where
    F: Fn(&Path) -> bool,
{
    fn exists(&self, path: &Path) -> bool {
        (self)(path)
    }
}

/// Probes the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct Filesystem;

impl Locator for Filesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Matched sources, C and assembly. A path is held at most once across both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sources {
    #[serde(rename = "target_c")]
    pub c: Vec<SourcePath>,
    #[serde(rename = "target_s")]
    pub asm: Vec<SourcePath>,
}

impl Sources {
    pub fn contains(&self, path: &SourcePath) -> bool {
        self.c.contains(path) || self.asm.contains(path)
    }

    /// Record a match unless the path is already known. Returns true when added.
    pub fn insert(&mut self, extension: Extension, path: SourcePath) -> bool {
        if self.contains(&path) {
            return false;
        }
        match extension {
            Extension::C => self.c.push(path),
            Extension::Asm => self.asm.push(path),
        }
        true
    }

    /// Both lists in plain string order, for reproducible output.
    pub fn sorted(mut self) -> Self {
        self.c.sort();
        self.asm.sort();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.c.is_empty() && self.asm.is_empty()
    }

    pub fn len(&self) -> usize {
        self.c.len() + self.asm.len()
    }
}

/// Nodes with a non-empty `compatible` field, depth first, parents before children.
pub fn compatibles<N: DeviceNode>(root: &N) -> Vec<&N> {
    fn visit<'a, N: DeviceNode>(node: &'a N, found: &mut Vec<&'a N>) {
        if node.fields(COMPATIBLE).is_some() {
            found.push(node)
        }
        for child in node.children() {
            visit(child, found)
        }
    }

    let mut found = Vec::new();
    visit(root, &mut found);
    found
}

/// The file stem for a compatible string with an optional device type.
pub fn file_stem(compatible: &str, device_type: Option<&str>) -> String {
    let name = match device_type {
        Some(device_type) => format!("{compatible}_{device_type}"),
        None => compatible.to_string(),
    };
    name.replace(',', "_")
}

/// Candidate file stems for a node, in lookup order.
/// The bare compatible string is always tried before any typed variant.
pub fn candidates<N: DeviceNode>(node: &N) -> Vec<String> {
    let device_types: Vec<Option<&str>> = [None]
        .into_iter()
        .chain(node.fields(DEVICE_TYPE).into_iter().flatten().map(Some))
        .collect();

    let device_types = &device_types;
    node.fields(COMPATIBLE)
        .into_iter()
        .flatten()
        .flat_map(move |compatible| {
            device_types
                .iter()
                .map(move |device_type| file_stem(compatible, *device_type))
        })
        .collect()
}

/// Resolves nodes to source files against a search path.
pub struct Resolver<'a, L> {
    search: &'a SearchPath,
    extensions: &'a [Extension],
    locator: L,
}

impl<'a, L: Locator> Resolver<'a, L> {
    pub fn new(search: &'a SearchPath, extensions: &'a [Extension], locator: L) -> Self {
        Self {
            search,
            extensions,
            locator,
        }
    }

    pub fn resolve<'n, N>(&self, nodes: impl IntoIterator<Item = &'n N>) -> Sources
    where
        N: DeviceNode + 'n,
    {
        let mut sources = Sources::default();
        for node in nodes {
            for stem in candidates(node) {
                for &extension in self.extensions {
                    let filename = format!("{stem}{}", extension.suffix());
                    if let Some(path) = self.locator.locate(&filename, self.search) {
                        if sources.insert(extension, path.clone()) {
                            debug!("{filename} -> {path}");
                        }
                    }
                }
            }
        }
        sources
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeSet;
    use test_case::test_case;

    #[derive(Debug, Default)]
    struct FakeNode {
        compatible: Vec<&'static str>,
        device_type: Option<Vec<&'static str>>,
        children: Vec<FakeNode>,
    }

    impl DeviceNode for FakeNode {
        fn fields(&self, name: &str) -> Option<Vec<&str>> {
            let values = match name {
                COMPATIBLE => Some(self.compatible.clone()),
                DEVICE_TYPE => self.device_type.clone(),
                _ => None,
            }?;
            (!values.is_empty()).then_some(values)
        }

        fn children(&self) -> &[Self] {
            &self.children
        }
    }

    fn node(compatible: &[&'static str]) -> FakeNode {
        FakeNode {
            compatible: compatible.to_vec(),
            ..FakeNode::default()
        }
    }

    fn typed(compatible: &[&'static str], device_type: &[&'static str]) -> FakeNode {
        FakeNode {
            device_type: Some(device_type.to_vec()),
            ..node(compatible)
        }
    }

    /// A fake driver tree holding exactly these files.
    fn listing(files: &[&str]) -> impl Fn(&Path) -> bool {
        let files: BTreeSet<PathBuf> = files.iter().map(PathBuf::from).collect();
        move |path: &Path| files.contains(path)
    }

    fn search() -> SearchPath {
        SearchPath::under(Path::new("metal"), &DRIVER_DIRS)
    }

    fn paths(list: &[SourcePath]) -> Vec<&str> {
        list.iter().map(SourcePath::as_str).collect()
    }

    fn resolve(nodes: &[FakeNode], files: &[&str]) -> Sources {
        let search = search();
        Resolver::new(&search, &EXTENSIONS, listing(files)).resolve(nodes)
    }

    #[test_case("sifive,uart0", None, "sifive_uart0" ; "bare")]
    #[test_case("sifive,gpio0", Some("gpio"), "sifive_gpio0_gpio" ; "typed")]
    #[test_case("riscv,cpu-intc", Some("interrupt-controller"), "riscv_cpu-intc_interrupt-controller" ; "dashes kept")]
    #[test_case("a,b,c", Some("d,e"), "a_b_c_d_e" ; "every comma")]
    #[test_case("fixed-clock", None, "fixed-clock" ; "no vendor")]
    fn file_stem_test(compatible: &str, device_type: Option<&str>, expected: &str) {
        assert_eq!(file_stem(compatible, device_type), expected);
    }

    #[test]
    fn candidates_order_test() {
        let n = typed(&["sifive,fu540-c000-uart", "sifive,uart0"], &["serial", "console"]);
        assert_eq!(
            candidates(&n),
            [
                "sifive_fu540-c000-uart",
                "sifive_fu540-c000-uart_serial",
                "sifive_fu540-c000-uart_console",
                "sifive_uart0",
                "sifive_uart0_serial",
                "sifive_uart0_console",
            ]
        );
    }

    #[test]
    fn empty_device_type_test() {
        let n = typed(&["sifive,uart0"], &[]);
        assert_eq!(candidates(&n), ["sifive_uart0"]);
    }

    #[test]
    fn compatibles_test() {
        let mut root = node(&["sifive,hifive1"]);
        let mut soc = node(&[]);
        soc.children = [node(&["sifive,uart0"]), typed(&[], &["cpu"])].into();
        root.children = [soc, node(&["sifive,gpio0"])].into();

        let found: Vec<Vec<&str>> = compatibles(&root).iter().map(|n| n.compatible.clone()).collect();
        assert_eq!(found, [["sifive,hifive1"], ["sifive,uart0"], ["sifive,gpio0"]]);
    }

    #[test]
    fn no_compatible_test() {
        let root = typed(&[], &["uart"]);
        let found = compatibles(&root);
        assert!(found.is_empty());
        let sources = resolve(&[], &["metal/src/uart.c"]);
        assert!(sources.is_empty());
    }

    #[test]
    fn single_match_test() {
        let sources = resolve(&[node(&["vendor,foo"])], &["metal/src/vendor_foo.c"]);
        assert_eq!(paths(&sources.c), ["metal/src/vendor_foo.c"]);
        assert!(sources.asm.is_empty());
    }

    #[test]
    fn typed_and_bare_test() {
        let files = ["metal/src/vendor_foo.c", "metal/src/vendor_foo_bar.c"];
        let sources = resolve(&[typed(&["vendor,foo"], &["bar"])], &files);
        assert_eq!(
            paths(&sources.c),
            ["metal/src/vendor_foo.c", "metal/src/vendor_foo_bar.c"]
        );
    }

    #[test]
    fn both_extensions_test() {
        let files = ["metal/src/drivers/sifive_trap.S", "metal/src/drivers/sifive_trap.c"];
        let sources = resolve(&[node(&["sifive,trap"])], &files);
        assert_eq!(paths(&sources.c), ["metal/src/drivers/sifive_trap.c"]);
        assert_eq!(paths(&sources.asm), ["metal/src/drivers/sifive_trap.S"]);
    }

    #[test]
    fn dedup_across_nodes_test() {
        let nodes = [
            node(&["sifive,uart0"]),
            node(&["sifive,fu540-c000-uart", "sifive,uart0"]),
        ];
        let sources = resolve(&nodes, &["metal/src/drivers/sifive_uart0.c"]);
        assert_eq!(sources.len(), 1);
        assert_eq!(paths(&sources.c), ["metal/src/drivers/sifive_uart0.c"]);
    }

    #[test]
    fn directory_precedence_test() {
        let files = ["metal/src/drivers/sifive_gpio0.c", "metal/src/sifive_gpio0.c"];
        let sources = resolve(&[node(&["sifive,gpio0"])], &files);
        assert_eq!(paths(&sources.c), ["metal/src/sifive_gpio0.c"]);
    }

    #[test]
    fn sorted_idempotent_test() {
        let nodes = [
            node(&["sifive,uart0"]),
            typed(&["sifive,gpio0"], &["gpio"]),
            node(&["riscv,clint0"]),
        ];
        let files = [
            "metal/src/drivers/sifive_uart0.c",
            "metal/src/drivers/sifive_gpio0_gpio.c",
            "metal/src/drivers/riscv_clint0.c",
            "metal/src/drivers/riscv_clint0.S",
        ];
        let first = resolve(&nodes, &files).sorted();
        let second = resolve(&nodes, &files).sorted();
        assert_eq!(first, second);
        assert_eq!(
            paths(&first.c),
            [
                "metal/src/drivers/riscv_clint0.c",
                "metal/src/drivers/sifive_gpio0_gpio.c",
                "metal/src/drivers/sifive_uart0.c",
            ]
        );
    }

    #[test]
    fn string_order_test() {
        let mut sources = Sources::default();
        sources.insert(Extension::C, SourcePath("src/a/b.c".into()));
        sources.insert(Extension::C, SourcePath("src/a.c".into()));
        let sources = sources.sorted();
        assert_eq!(paths(&sources.c), ["src/a.c", "src/a/b.c"]);
    }

    #[test]
    fn combined_dedup_test() {
        let mut sources = Sources::default();
        assert!(sources.insert(Extension::Asm, SourcePath("x".into())));
        assert!(!sources.insert(Extension::C, SourcePath("x".into())));
        assert!(sources.c.is_empty());
    }
}
