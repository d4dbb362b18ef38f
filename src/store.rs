use std::mem;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};

/// Hierarchical JSON store over SQLite. Values live only at leaf paths;
/// interior nodes exist implicitly through their descendants. Scalars and
/// non-empty arrays are leaves, objects decompose one segment per key, and
/// `null` / `{}` / `[]` prune the subtree they are written to.
pub struct Store {
    conn: Connection,
    dirty: Vec<String>,
}

impl Store {
    pub fn open(workspace: &Path) -> Result<Store> {
        std::fs::create_dir_all(workspace)
            .with_context(|| format!("create workspace {}", workspace.display()))?;
        let db_path = workspace.join("mtsk.sqlite3");
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes(
                path TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Store {
            conn,
            dirty: Vec::new(),
        })
    }

    /// Paths touched by mutations since the last drain. Roots only; watchers
    /// decide relevance by ancestor/descendant relationship.
    pub fn take_dirty(&mut self) -> Vec<String> {
        mem::take(&mut self.dirty)
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        check_path(path)?;
        let exact: Option<String> = self
            .conn
            .query_row("SELECT value FROM nodes WHERE path = ?", [path], |r| {
                r.get(0)
            })
            .optional()?;
        if let Some(text) = exact {
            let v: Value =
                serde_json::from_str(&text).with_context(|| format!("corrupt node at {path}"))?;
            return Ok(Some(v));
        }

        let mut stmt = self.conn.prepare(
            // '0' is the code point after '/', so this range is exactly the subtree.
            "SELECT path, value FROM nodes WHERE path >= ?1 AND path < ?2 ORDER BY path",
        )?;
        let lo = format!("{path}/");
        let hi = format!("{path}0");
        let rows = stmt.query_map([&lo, &hi], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;

        let mut root = Map::new();
        let mut any = false;
        for row in rows {
            let (leaf_path, text) = row?;
            let v: Value = serde_json::from_str(&text)
                .with_context(|| format!("corrupt node at {leaf_path}"))?;
            let rel = &leaf_path[lo.len()..];
            insert_at(&mut root, &rel.split('/').collect::<Vec<_>>(), v);
            any = true;
        }
        if any {
            Ok(Some(Value::Object(root)))
        } else {
            Ok(None)
        }
    }

    /// Replaces the subtree at `path` with `value`.
    pub fn set(&mut self, path: &str, value: &Value) -> Result<()> {
        check_path(path)?;
        let tx = self.conn.unchecked_transaction()?;
        delete_subtree(&tx, path)?;
        write_tree(&tx, path, value)?;
        tx.commit()?;
        self.dirty.push(path.to_string());
        Ok(())
    }

    /// Shallow merge at `path`: each key of `partial` replaces that child
    /// wholesale, `null` removes it. Keys may contain slashes, addressing
    /// deeper descendants directly. Applied as one transaction.
    pub fn update(&mut self, path: &str, partial: &Map<String, Value>) -> Result<()> {
        check_path(path)?;
        let tx = self.conn.unchecked_transaction()?;
        let mut touched = Vec::with_capacity(partial.len());
        for (key, value) in partial {
            let child = format!("{path}/{key}");
            check_path(&child)?;
            delete_subtree(&tx, &child)?;
            write_tree(&tx, &child, value)?;
            touched.push(child);
        }
        tx.commit()?;
        self.dirty.extend(touched);
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Result<()> {
        check_path(path)?;
        let tx = self.conn.unchecked_transaction()?;
        delete_subtree(&tx, path)?;
        tx.commit()?;
        self.dirty.push(path.to_string());
        Ok(())
    }
}

fn check_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("empty path");
    }
    if path.split('/').any(|seg| seg.is_empty()) {
        bail!("empty segment in path: {path}");
    }
    Ok(())
}

/// Removes the leaf at `path`, every descendant, and any ancestor leaf that
/// would otherwise shadow the new subtree.
fn delete_subtree(conn: &Connection, path: &str) -> Result<()> {
    conn.execute("DELETE FROM nodes WHERE path = ?", [path])?;
    conn.execute(
        "DELETE FROM nodes WHERE path >= ?1 AND path < ?2",
        [&format!("{path}/"), &format!("{path}0")],
    )?;
    let mut ancestor = path;
    while let Some(idx) = ancestor.rfind('/') {
        ancestor = &ancestor[..idx];
        conn.execute("DELETE FROM nodes WHERE path = ?", [ancestor])?;
    }
    Ok(())
}

fn write_tree(conn: &Connection, path: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => {
            for (key, child) in map {
                if key.is_empty() || key.contains('/') {
                    bail!("invalid key {key:?} under {path}");
                }
                write_tree(conn, &format!("{path}/{key}"), child)?;
            }
            Ok(())
        }
        Value::Array(items) if items.is_empty() => Ok(()),
        leaf => {
            conn.execute(
                "INSERT INTO nodes(path, value) VALUES(?, ?)
                 ON CONFLICT(path) DO UPDATE SET value = excluded.value",
                (path, leaf.to_string()),
            )?;
            Ok(())
        }
    }
}

fn insert_at(node: &mut Map<String, Value>, segs: &[&str], value: Value) {
    let (head, rest) = match segs.split_first() {
        Some(v) => v,
        None => return,
    };
    if rest.is_empty() {
        node.insert(head.to_string(), value);
        return;
    }
    let child = node
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(map) = child {
        insert_at(map, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_store(prefix: &str) -> Store {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir: PathBuf = std::env::temp_dir().join(format!("mtskd_{prefix}_{nanos}"));
        Store::open(&dir).expect("open store")
    }

    #[test]
    fn set_get_roundtrips_nested_objects() {
        let mut s = temp_store("roundtrip");
        let v = json!({
            "name": "ÖZEL BİGA LİDER MTSK",
            "candidates": { "kind": "classCounts", "counts": { "B": 3, "A1": 2 } },
            "tags": ["x", "y"],
        });
        s.set("schools/1", &v).unwrap();
        assert_eq!(s.get("schools/1").unwrap(), Some(v));
        assert_eq!(
            s.get("schools/1/candidates/counts/B").unwrap(),
            Some(json!(3))
        );
        assert_eq!(s.get("schools/2").unwrap(), None);
    }

    #[test]
    fn set_replaces_whole_subtree() {
        let mut s = temp_store("replace");
        s.set("a", &json!({ "b": 1, "c": { "d": 2 } })).unwrap();
        s.set("a", &json!({ "e": 3 })).unwrap();
        assert_eq!(s.get("a").unwrap(), Some(json!({ "e": 3 })));
        assert_eq!(s.get("a/c/d").unwrap(), None);
    }

    #[test]
    fn update_merges_shallow_and_supports_slash_keys() {
        let mut s = temp_store("update");
        s.set("r", &json!({ "a": 1, "b": { "x": 1, "y": 2 } }))
            .unwrap();
        let mut patch = Map::new();
        patch.insert("a".to_string(), json!(9));
        patch.insert("b/x".to_string(), json!(7));
        s.update("r", &patch).unwrap();
        assert_eq!(
            s.get("r").unwrap(),
            Some(json!({ "a": 9, "b": { "x": 7, "y": 2 } }))
        );
        // Top-level keys replace the child wholesale.
        let mut patch = Map::new();
        patch.insert("b".to_string(), json!({ "z": 1 }));
        s.update("r", &patch).unwrap();
        assert_eq!(
            s.get("r").unwrap(),
            Some(json!({ "a": 9, "b": { "z": 1 } }))
        );
    }

    #[test]
    fn null_and_empty_composites_prune() {
        let mut s = temp_store("prune");
        s.set("k", &json!({ "a": 1 })).unwrap();
        s.set("k", &Value::Null).unwrap();
        assert_eq!(s.get("k").unwrap(), None);

        s.set("k", &json!({ "a": 1, "b": {}, "c": [] })).unwrap();
        assert_eq!(s.get("k").unwrap(), Some(json!({ "a": 1 })));

        let mut patch = Map::new();
        patch.insert("a".to_string(), Value::Null);
        s.update("k", &patch).unwrap();
        assert_eq!(s.get("k").unwrap(), None);
    }

    #[test]
    fn remove_deletes_subtree_only() {
        let mut s = temp_store("remove");
        s.set("messages/m1", &json!({ "content": "a" })).unwrap();
        s.set("messages/m2", &json!({ "content": "b" })).unwrap();
        s.remove("messages/m1").unwrap();
        assert_eq!(
            s.get("messages").unwrap(),
            Some(json!({ "m2": { "content": "b" } }))
        );
        s.remove("messages").unwrap();
        assert_eq!(s.get("messages").unwrap(), None);
    }

    #[test]
    fn writing_under_a_scalar_replaces_the_scalar() {
        let mut s = temp_store("shadow");
        s.set("n", &json!(5)).unwrap();
        s.set("n/child", &json!(1)).unwrap();
        assert_eq!(s.get("n").unwrap(), Some(json!({ "child": 1 })));
    }

    #[test]
    fn dirty_tracks_mutation_roots() {
        let mut s = temp_store("dirty");
        s.set("licenseFees/B", &json!(15000)).unwrap();
        let mut patch = Map::new();
        patch.insert("A1".to_string(), json!(12000));
        s.update("licenseFees", &patch).unwrap();
        assert_eq!(
            s.take_dirty(),
            vec!["licenseFees/B".to_string(), "licenseFees/A1".to_string()]
        );
        assert!(s.take_dirty().is_empty());
    }

    #[test]
    fn rejects_bad_paths() {
        let mut s = temp_store("badpath");
        assert!(s.set("", &json!(1)).is_err());
        assert!(s.set("a//b", &json!(1)).is_err());
        assert!(s.get("/a").is_err());
        assert!(s.set("a", &json!({ "x/y": 1 })).is_err());
    }
}
