//! Insertion-ordered hash table with a string fast path.
//!
//! # Layout
//!
//! ```text
//! strings : text  -> (key, value)          plain string keys
//! buckets : code  -> head node index        every other key
//! nodes   : slab of { key, value, code, next }
//! order   : [Str(text) | Node(index)]       live keys, insertion order
//! ```
//!
//! A key lives in exactly one of `strings` and `nodes`, and `order` holds one
//! entry per live key. Collisions chain through `next` in insertion order.
//! Hash codes and equality for non-string keys come from a [`KeyProtocol`],
//! which the runtime implements by dispatching `hash` and `eql?`.

use crate::error::Result;
use crate::runtime::frame::Proc;
use crate::runtime::value::Value;
use fxhash::FxHashMap;
use std::rc::Rc;

/// Hash codes and equality for keys outside the string fast path.
pub trait KeyProtocol {
    /// Hash code of `key`.
    fn key_hash(&mut self, key: &Value) -> Result<u64>;

    /// Whether `probe` matches `stored`, decided by the probe key.
    fn key_eql(&mut self, probe: &Value, stored: &Value) -> Result<bool>;
}

/// What a read of a missing key produces.
#[derive(Debug, Clone)]
pub enum DefaultPolicy {
    Value(Value),
    /// Called with the hash and the key.
    Proc(Rc<Proc>),
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        DefaultPolicy::Value(Value::Nil)
    }
}

#[derive(Debug, Clone)]
struct Node {
    key: Value,
    value: Value,
    code: u64,
    next: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum OrderKey {
    Str(Rc<str>),
    Node(usize),
}

/// The table behind a `Hash` value.
#[derive(Debug, Clone, Default)]
pub struct HashTable {
    strings: FxHashMap<Rc<str>, (Value, Value)>,
    buckets: FxHashMap<u64, usize>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    order: Vec<OrderKey>,
    identity: bool,
    default: DefaultPolicy,
}

impl HashTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether keys are compared by identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    #[must_use]
    pub fn default_policy(&self) -> &DefaultPolicy {
        &self.default
    }

    /// Sets a static default, clearing any default proc.
    pub fn set_default(&mut self, value: Value) {
        self.default = DefaultPolicy::Value(value);
    }

    /// Sets a default proc, clearing any static default.
    pub fn set_default_proc(&mut self, block: Rc<Proc>) {
        self.default = DefaultPolicy::Proc(block);
    }

    fn fast_key(&self, key: &Value) -> Option<Rc<str>> {
        match key {
            Value::String(s) if !self.identity => Some(s.shared()),
            _ => None,
        }
    }

    fn code(&self, proto: &mut dyn KeyProtocol, key: &Value) -> Result<u64> {
        if self.identity {
            #[allow(clippy::cast_sign_loss)]
            return Ok(key.object_id() as u64);
        }
        proto.key_hash(key)
    }

    /// Locates `key` in the chain for `code`, returning the node index and
    /// its predecessor in the chain.
    fn find(
        &self,
        proto: &mut dyn KeyProtocol,
        key: &Value,
        code: u64,
    ) -> Result<Option<(Option<usize>, usize)>> {
        let mut prev = None;
        let mut cursor = self.buckets.get(&code).copied();
        while let Some(index) = cursor {
            let Some(node) = self.nodes[index].as_ref() else {
                break;
            };
            let hit = if self.identity {
                key.identical(&node.key)
            } else {
                proto.key_eql(key, &node.key)?
            };
            if hit {
                return Ok(Some((prev, index)));
            }
            prev = Some(index);
            cursor = node.next;
        }
        Ok(None)
    }

    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Some(node);
                index
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Appends node `index` to the tail of the chain for `code`.
    fn link(&mut self, code: u64, index: usize) {
        let Some(mut cursor) = self.buckets.get(&code).copied() else {
            self.buckets.insert(code, index);
            return;
        };
        while let Some(next) = self.nodes[cursor].as_ref().and_then(|n| n.next) {
            cursor = next;
        }
        if let Some(tail) = self.nodes[cursor].as_mut() {
            tail.next = Some(index);
        }
    }

    fn unlink(&mut self, code: u64, prev: Option<usize>, index: usize) {
        let next = self.nodes[index].as_mut().and_then(|n| n.next.take());
        match prev {
            Some(p) => {
                if let Some(node) = self.nodes[p].as_mut() {
                    node.next = next;
                }
            }
            None => match next {
                Some(n) => {
                    self.buckets.insert(code, n);
                }
                None => {
                    self.buckets.remove(&code);
                }
            },
        }
    }

    fn predecessor(&self, code: u64, index: usize) -> Option<usize> {
        let mut prev = None;
        let mut cursor = self.buckets.get(&code).copied();
        while let Some(i) = cursor {
            if i == index {
                return prev;
            }
            prev = Some(i);
            cursor = self.nodes[i].as_ref().and_then(|n| n.next);
        }
        None
    }

    fn append_node(&mut self, key: Value, value: Value, code: u64) {
        let index = self.alloc(Node {
            key,
            value,
            code,
            next: None,
        });
        self.link(code, index);
        self.order.push(OrderKey::Node(index));
    }

    /// Inserts or overwrites. Overwriting keeps the entry's position and the
    /// originally stored key.
    pub fn put(&mut self, proto: &mut dyn KeyProtocol, key: Value, value: Value) -> Result<()> {
        if let Some(text) = self.fast_key(&key) {
            match self.strings.get_mut(&text) {
                Some(slot) => slot.1 = value,
                None => {
                    self.order.push(OrderKey::Str(Rc::clone(&text)));
                    self.strings.insert(text, (key, value));
                }
            }
            return Ok(());
        }

        let code = self.code(proto, &key)?;
        if let Some((_, index)) = self.find(proto, &key, code)? {
            if let Some(node) = self.nodes[index].as_mut() {
                node.value = value;
            }
            return Ok(());
        }
        self.append_node(key, value, code);
        Ok(())
    }

    /// Stored value, or `None` when absent. A stored `nil` is `Some(nil)`.
    pub fn get(&self, proto: &mut dyn KeyProtocol, key: &Value) -> Result<Option<Value>> {
        if let Some(text) = self.fast_key(key) {
            return Ok(self.strings.get(&text).map(|(_, v)| v.clone()));
        }
        let code = self.code(proto, key)?;
        Ok(self
            .find(proto, key, code)?
            .and_then(|(_, index)| self.nodes[index].as_ref())
            .map(|node| node.value.clone()))
    }

    pub fn contains_key(&self, proto: &mut dyn KeyProtocol, key: &Value) -> Result<bool> {
        Ok(self.get(proto, key)?.is_some())
    }

    /// Removes `key`, returning its value or `None` when absent.
    pub fn delete(&mut self, proto: &mut dyn KeyProtocol, key: &Value) -> Result<Option<Value>> {
        if let Some(text) = self.fast_key(key) {
            let Some((_, value)) = self.strings.remove(&text) else {
                return Ok(None);
            };
            let target = OrderKey::Str(text);
            if let Some(pos) = self.order.iter().position(|k| *k == target) {
                self.order.remove(pos);
            }
            return Ok(Some(value));
        }

        let code = self.code(proto, key)?;
        let Some((prev, index)) = self.find(proto, key, code)? else {
            return Ok(None);
        };
        self.unlink(code, prev, index);
        let removed = self.nodes[index].take();
        self.free.push(index);
        let target = OrderKey::Node(index);
        if let Some(pos) = self.order.iter().position(|k| *k == target) {
            self.order.remove(pos);
        }
        Ok(removed.map(|node| node.value))
    }

    /// Recomputes the code of every non-string key and moves entries whose
    /// code changed into their new chain. Iteration order is unaffected.
    pub fn rehash(&mut self, proto: &mut dyn KeyProtocol) -> Result<()> {
        if self.identity {
            return Ok(());
        }
        let indices: Vec<usize> = self
            .order
            .iter()
            .filter_map(|k| match k {
                OrderKey::Node(i) => Some(*i),
                OrderKey::Str(_) => None,
            })
            .collect();

        for index in indices {
            let Some((key, old)) = self.nodes[index].as_ref().map(|n| (n.key.clone(), n.code)) else {
                continue;
            };
            let new = proto.key_hash(&key)?;
            if new == old {
                continue;
            }
            let prev = self.predecessor(old, index);
            self.unlink(old, prev, index);
            if let Some(node) = self.nodes[index].as_mut() {
                node.code = new;
            }
            self.link(new, index);
        }
        Ok(())
    }

    /// Switches to identity comparison. One-way; existing entries are
    /// re-indexed by identity in their current order.
    pub fn compare_by_identity(&mut self) {
        if self.identity {
            return;
        }
        let entries = self.entries();
        self.strings.clear();
        self.buckets.clear();
        self.nodes.clear();
        self.free.clear();
        self.order.clear();
        self.identity = true;
        for (key, value) in entries {
            #[allow(clippy::cast_sign_loss)]
            let code = key.object_id() as u64;
            self.append_node(key, value, code);
        }
    }

    /// Copies every entry of `other` into `self`, overwriting on collision.
    pub fn merge_from(&mut self, proto: &mut dyn KeyProtocol, other: &HashTable) -> Result<()> {
        for (key, value) in other.entries() {
            self.put(proto, key, value)?;
        }
        Ok(())
    }

    /// Removes every entry; mode and default policy are kept.
    pub fn clear(&mut self) {
        self.strings.clear();
        self.buckets.clear();
        self.nodes.clear();
        self.free.clear();
        self.order.clear();
    }

    /// Key/value pairs in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.order
            .iter()
            .filter_map(|k| match k {
                OrderKey::Str(text) => self.strings.get(text).cloned(),
                OrderKey::Node(i) => self.nodes[*i]
                    .as_ref()
                    .map(|n| (n.key.clone(), n.value.clone())),
            })
            .collect()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Integers hash to `n % 3` so small tables collide; everything else
    /// hashes by identity. Overrides simulate keys whose hash changes.
    #[derive(Default)]
    struct Modular {
        overrides: HashMap<i64, u64>,
        calls: usize,
    }

    impl KeyProtocol for Modular {
        fn key_hash(&mut self, key: &Value) -> Result<u64> {
            self.calls += 1;
            Ok(match key {
                Value::Integer(n) => self
                    .overrides
                    .get(n)
                    .copied()
                    .unwrap_or(n.rem_euclid(3) as u64),
                other => other.object_id() as u64,
            })
        }

        fn key_eql(&mut self, probe: &Value, stored: &Value) -> Result<bool> {
            Ok(probe == stored)
        }
    }

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_string_keys_keep_first_insertion_position() {
        let mut proto = Modular::default();
        let mut table = HashTable::new();
        table.put(&mut proto, Value::str("b"), int(1)).unwrap();
        table.put(&mut proto, Value::str("a"), int(2)).unwrap();
        table.put(&mut proto, Value::str("b"), int(3)).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.keys(), vec![Value::str("b"), Value::str("a")]);
        assert_eq!(table.values(), vec![int(3), int(2)]);
        assert_eq!(proto.calls, 0);
    }

    #[test]
    fn test_reinsert_after_delete_moves_to_end() {
        let mut proto = Modular::default();
        let mut table = HashTable::new();
        table.put(&mut proto, Value::str("b"), int(1)).unwrap();
        table.put(&mut proto, Value::str("a"), int(2)).unwrap();

        assert_eq!(table.delete(&mut proto, &Value::str("b")).unwrap(), Some(int(1)));
        table.put(&mut proto, Value::str("b"), int(4)).unwrap();
        assert_eq!(table.keys(), vec![Value::str("a"), Value::str("b")]);
    }

    #[test]
    fn test_missing_is_distinct_from_stored_nil() {
        let mut proto = Modular::default();
        let mut table = HashTable::new();
        table.put(&mut proto, int(1), Value::Nil).unwrap();
        table.put(&mut proto, Value::str("f"), Value::False).unwrap();

        assert_eq!(table.get(&mut proto, &int(1)).unwrap(), Some(Value::Nil));
        assert_eq!(table.get(&mut proto, &Value::str("f")).unwrap(), Some(Value::False));
        assert_eq!(table.get(&mut proto, &int(2)).unwrap(), None);
        assert_eq!(table.get(&mut proto, &Value::str("g")).unwrap(), None);
        assert_eq!(table.delete(&mut proto, &int(2)).unwrap(), None);
    }

    #[test]
    fn test_collision_chain_survives_middle_and_head_deletes() {
        let mut proto = Modular::default();
        let mut table = HashTable::new();
        for n in [1, 4, 7, 10] {
            table.put(&mut proto, int(n), int(n * 10)).unwrap();
        }

        table.delete(&mut proto, &int(4)).unwrap();
        table.delete(&mut proto, &int(1)).unwrap();

        assert_eq!(table.get(&mut proto, &int(7)).unwrap(), Some(int(70)));
        assert_eq!(table.get(&mut proto, &int(10)).unwrap(), Some(int(100)));
        assert_eq!(table.get(&mut proto, &int(4)).unwrap(), None);
        assert_eq!(table.keys(), vec![int(7), int(10)]);

        // Freed slots are reused without disturbing order.
        table.put(&mut proto, int(13), int(130)).unwrap();
        assert_eq!(table.keys(), vec![int(7), int(10), int(13)]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_rehash_moves_changed_keys_only() {
        let mut proto = Modular::default();
        let mut table = HashTable::new();
        for n in [1, 2, 4] {
            table.put(&mut proto, int(n), int(n)).unwrap();
        }

        proto.overrides.insert(1, 2);
        assert_eq!(table.get(&mut proto, &int(1)).unwrap(), None);

        table.rehash(&mut proto).unwrap();
        assert_eq!(table.get(&mut proto, &int(1)).unwrap(), Some(int(1)));
        assert_eq!(table.get(&mut proto, &int(4)).unwrap(), Some(int(4)));
        assert_eq!(table.get(&mut proto, &int(2)).unwrap(), Some(int(2)));
        assert_eq!(table.keys(), vec![int(1), int(2), int(4)]);
    }

    #[test]
    fn test_identity_mode_separates_equal_keys() {
        let mut proto = Modular::default();
        let first = Value::str("k");
        let second = Value::str("k");

        let mut by_value = HashTable::new();
        by_value.put(&mut proto, first.clone(), int(1)).unwrap();
        by_value.put(&mut proto, second.clone(), int(2)).unwrap();
        assert_eq!(by_value.len(), 1);

        let mut by_identity = HashTable::new();
        by_identity.compare_by_identity();
        by_identity.put(&mut proto, first.clone(), int(1)).unwrap();
        by_identity.put(&mut proto, second.clone(), int(2)).unwrap();
        assert_eq!(by_identity.len(), 2);
        assert_eq!(by_identity.get(&mut proto, &first).unwrap(), Some(int(1)));
        assert_eq!(by_identity.get(&mut proto, &Value::str("k")).unwrap(), None);
    }

    #[test]
    fn test_compare_by_identity_migrates_entries() {
        let mut proto = Modular::default();
        let key = Value::str("a");
        let mut table = HashTable::new();
        table.put(&mut proto, key.clone(), int(1)).unwrap();
        table.put(&mut proto, int(5), int(2)).unwrap();

        table.compare_by_identity();
        assert!(table.is_identity());
        assert_eq!(table.keys(), vec![key.clone(), int(5)]);
        assert_eq!(table.get(&mut proto, &key).unwrap(), Some(int(1)));
        assert_eq!(table.get(&mut proto, &int(5)).unwrap(), Some(int(2)));
    }

    #[test]
    fn test_default_policies_are_exclusive() {
        let mut table = HashTable::new();
        table.set_default(int(0));
        assert!(matches!(table.default_policy(), DefaultPolicy::Value(Value::Integer(0))));

        let block = Rc::new(Proc::new(
            Rc::new(|_rt: &mut crate::Runtime, _call: &crate::runtime::frame::BlockCall| {
                Ok(Value::Nil)
            }),
            crate::runtime::method::Arity::exact(2),
            Value::Nil,
            None,
            None,
        ));
        table.set_default_proc(block);
        assert!(matches!(table.default_policy(), DefaultPolicy::Proc(_)));

        table.set_default(Value::Nil);
        assert!(matches!(table.default_policy(), DefaultPolicy::Value(Value::Nil)));
    }

    #[test]
    fn test_merge_and_clear() {
        let mut proto = Modular::default();
        let mut left = HashTable::new();
        left.put(&mut proto, Value::str("a"), int(1)).unwrap();
        let mut right = HashTable::new();
        right.put(&mut proto, Value::str("a"), int(2)).unwrap();
        right.put(&mut proto, int(3), int(3)).unwrap();

        left.merge_from(&mut proto, &right).unwrap();
        assert_eq!(left.values(), vec![int(2), int(3)]);

        left.clear();
        assert!(left.is_empty());
        assert_eq!(left.get(&mut proto, &int(3)).unwrap(), None);
    }
}
