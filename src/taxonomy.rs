// NCBI taxonomy: the taxid -> parent map and LCA queries.
//
// Loaded once from nodes.dmp before any worker starts, then shared
// read-only. Taxids that are missing from the map resolve to 0, the
// "unclassified" sentinel, rather than erroring: reference databases are
// routinely newer or older than the taxonomy dump they are used with.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Read-only view of the taxonomy tree.
pub struct Taxonomy {
    parents: HashMap<u64, u64>,
}

impl Taxonomy {
    /// Build from an explicit parent map. The root may point at itself.
    pub fn from_parent_map(parents: HashMap<u64, u64>) -> Self {
        Taxonomy { parents }
    }

    /// Parse `nodes.dmp`: one node per line, fields separated by `\t|\t`,
    /// the first two fields being taxid and parent taxid. Lines with fewer
    /// than two fields are skipped.
    pub fn from_nodes_dmp(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut parents = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split("\t|\t");
            let taxid = fields.next().and_then(|f| f.trim().parse::<u64>().ok());
            let parent = fields.next().and_then(|f| f.trim().parse::<u64>().ok());
            if let (Some(taxid), Some(parent)) = (taxid, parent) {
                parents.insert(taxid, parent);
            }
        }

        if parents.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no taxonomy nodes parsed from {}", path.display()),
            ));
        }
        log::info!("Read {} taxonomy nodes from {}", parents.len(), path.display());
        Ok(Taxonomy { parents })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Parent of `taxid`, or `None` when the taxid is unknown.
    pub fn parent(&self, taxid: u64) -> Option<u64> {
        self.parents.get(&taxid).copied()
    }

    /// Lowest common ancestor of two taxa.
    ///
    /// Walks `a`'s ancestor chain into a seen-set, then walks `b`'s chain
    /// until it hits a seen taxon. Unknown taxids resolve to 0.
    pub fn lca(&self, a: u64, b: u64) -> u64 {
        if a == 0 || b == 0 {
            return 0;
        }
        if a == b {
            return a;
        }

        let mut seen = HashSet::new();
        let mut node = a;
        loop {
            seen.insert(node);
            match self.parents.get(&node) {
                // Root: parent is itself or 0.
                Some(&p) if p == node || p == 0 => break,
                Some(&p) => node = p,
                None => break,
            }
        }
        if !self.parents.contains_key(&a) {
            return 0;
        }

        let mut node = b;
        loop {
            if seen.contains(&node) {
                return node;
            }
            match self.parents.get(&node) {
                Some(&p) if p == node || p == 0 => return 0,
                Some(&p) => node = p,
                None => return 0,
            }
        }
    }

    /// Fold `lca` over a set of taxa. An empty set is unclassified.
    pub fn lca_many<I>(&self, taxa: I) -> u64
    where
        I: IntoIterator<Item = u64>,
    {
        let mut iter = taxa.into_iter();
        let first = match iter.next() {
            Some(t) => t,
            None => return 0,
        };
        let mut acc = first;
        for t in iter {
            if acc == 0 {
                return 0;
            }
            acc = self.lca(acc, t);
        }
        acc
    }
}
