//! Arena-backed price index: one per side of an [`OrderBook`](super::order_book::OrderBook).
//!
//! Nodes live in a flat `Vec`, addressed by index rather than raw pointer,
//! so the parent/left/right links that the original red-black tree carried
//! as owning pointers (and which formed a reference cycle) become plain
//! `Option<usize>` — no cyclic ownership, and the whole structure is a
//! flat, `Clone`-able snapshot.
//!
//! This is a binary search tree over price, not a balanced red-black tree:
//! a level's FIFO is allowed to linger empty until the next structural
//! change touches it, so no rebalancing is required for correctness, only
//! leaf unlinking on eviction. Degenerate (sorted) insertion order produces
//! a list rather than a tree; acceptable for the scope of this core (see
//! `DESIGN.md`).

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::models::types::Order;

type NodeIndex = usize;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PriceNode {
    price: Decimal,
    orders: VecDeque<Order>,
    parent: Option<NodeIndex>,
    left: Option<NodeIndex>,
    right: Option<NodeIndex>,
}

/// Whether the index keeps its extreme at the max price (bids) or the min
/// price (asks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extreme {
    Max,
    Min,
}

/// One side of an order book: an arena of price nodes plus the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevelIndex {
    nodes: Vec<PriceNode>,
    root: Option<NodeIndex>,
    extreme: Extreme,
}

impl PriceLevelIndex {
    pub fn new(extreme: Extreme) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            extreme,
        }
    }

    /// Inserts `order` into the FIFO at `price`, creating the level if it
    /// does not exist yet. Returns the node index so the owning book can
    /// record an O(1) back-reference.
    pub fn insert(&mut self, price: Decimal, order: Order) -> NodeIndex {
        if let Some(idx) = self.find(price) {
            self.nodes[idx].orders.push_back(order);
            return idx;
        }
        self.insert_new_node(price, order)
    }

    fn insert_new_node(&mut self, price: Decimal, order: Order) -> NodeIndex {
        let mut orders = VecDeque::new();
        orders.push_back(order);
        let new_idx = self.nodes.len();
        self.nodes.push(PriceNode {
            price,
            orders,
            parent: None,
            left: None,
            right: None,
        });

        let Some(root) = self.root else {
            self.root = Some(new_idx);
            return new_idx;
        };

        let mut cursor = root;
        loop {
            if price < self.nodes[cursor].price {
                match self.nodes[cursor].left {
                    Some(child) => cursor = child,
                    None => {
                        self.nodes[cursor].left = Some(new_idx);
                        self.nodes[new_idx].parent = Some(cursor);
                        break;
                    }
                }
            } else {
                match self.nodes[cursor].right {
                    Some(child) => cursor = child,
                    None => {
                        self.nodes[cursor].right = Some(new_idx);
                        self.nodes[new_idx].parent = Some(cursor);
                        break;
                    }
                }
            }
        }
        new_idx
    }

    fn find(&self, price: Decimal) -> Option<NodeIndex> {
        let mut cursor = self.root;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            if price == node.price {
                return Some(idx);
            }
            cursor = if price < node.price {
                node.left
            } else {
                node.right
            };
        }
        None
    }

    /// Walks to the extreme leaf (leftmost for `Min`, rightmost for `Max`),
    /// skipping and unlinking empty levels along the way.
    fn extreme_node(&mut self) -> Option<NodeIndex> {
        loop {
            let mut cursor = self.root?;
            loop {
                let next = match self.extreme {
                    Extreme::Max => self.nodes[cursor].right,
                    Extreme::Min => self.nodes[cursor].left,
                };
                match next {
                    Some(child) => cursor = child,
                    None => break,
                }
            }

            if self.nodes[cursor].orders.is_empty() {
                self.unlink(cursor);
                continue;
            }
            return Some(cursor);
        }
    }

    /// Removes a node with no subtree on the extreme side, reattaching its
    /// remaining child (if any) in its place.
    fn unlink(&mut self, idx: NodeIndex) {
        let parent = self.nodes[idx].parent;
        let replacement = match self.extreme {
            Extreme::Max => self.nodes[idx].left,
            Extreme::Min => self.nodes[idx].right,
        };

        if let Some(r) = replacement {
            self.nodes[r].parent = parent;
        }

        match parent {
            None => self.root = replacement,
            Some(p) => {
                if self.nodes[p].left == Some(idx) {
                    self.nodes[p].left = replacement;
                } else {
                    self.nodes[p].right = replacement;
                }
            }
        }

        self.nodes[idx].parent = None;
        self.nodes[idx].left = None;
        self.nodes[idx].right = None;
    }

    /// The extreme price, or none if the index holds no non-empty level.
    pub fn peek_price(&mut self) -> Option<Decimal> {
        let idx = self.extreme_node()?;
        Some(self.nodes[idx].price)
    }

    /// A reference to the first (oldest) order at the extreme level.
    pub fn best(&mut self) -> Option<&Order> {
        let idx = self.extreme_node()?;
        self.nodes[idx].orders.front()
    }

    pub fn best_mut(&mut self) -> Option<&mut Order> {
        let idx = self.extreme_node()?;
        self.nodes[idx].orders.front_mut()
    }

    /// Removes the order at `node` whose id matches `order_id`, returning
    /// it. O(1) beyond the FIFO scan for the matching id (levels are
    /// rarely more than a few orders deep in this core's scope).
    pub fn remove(&mut self, node: NodeIndex, order_id: uuid::Uuid) -> Option<Order> {
        let level = self.nodes.get_mut(node)?;
        let pos = level.orders.iter().position(|o| o.id == order_id)?;
        level.orders.remove(pos)
    }

    pub fn is_level_empty(&self, node: NodeIndex) -> bool {
        self.nodes.get(node).is_some_and(|n| n.orders.is_empty())
    }
}
