use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Debug;

use dagsched_core::{SchedulerError, SchedulerResult};

/// 有向依赖图
///
/// 节点是不透明的id, 实体本身保存在调用方的 id 映射中。边 `from -> to`
/// 表示 `to` 依赖 `from`。有序存储保证拓扑序和调度前沿是确定的。
#[derive(Debug, Clone)]
pub struct DependencyGraph<N: Ord + Clone + Debug> {
    downstream: BTreeMap<N, BTreeSet<N>>,
    upstream: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Ord + Clone + Debug> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Ord + Clone + Debug> DependencyGraph<N> {
    pub fn new() -> Self {
        Self {
            downstream: BTreeMap::new(),
            upstream: BTreeMap::new(),
        }
    }

    /// 添加节点, 已存在时不做任何事
    pub fn add_node(&mut self, id: N) {
        self.downstream.entry(id.clone()).or_default();
        self.upstream.entry(id).or_default();
    }

    /// 添加边, 两端节点都必须已存在。重复的边会被忽略
    pub fn add_edge(&mut self, from: N, to: N) -> SchedulerResult<()> {
        for node in [&from, &to] {
            if !self.contains(node) {
                return Err(SchedulerError::GraphNodeNotFound(format!("{node:?}")));
            }
        }

        self.downstream
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        self.upstream.entry(to).or_default().insert(from);
        Ok(())
    }

    /// 删除节点及其所有相关边, 返回节点是否存在
    pub fn delete_node_if_exists(&mut self, id: &N) -> bool {
        let Some(successors) = self.downstream.remove(id) else {
            return false;
        };
        let predecessors = self.upstream.remove(id).unwrap_or_default();

        for succ in &successors {
            if let Some(preds) = self.upstream.get_mut(succ) {
                preds.remove(id);
            }
        }
        for pred in &predecessors {
            if let Some(succs) = self.downstream.get_mut(pred) {
                succs.remove(id);
            }
        }
        true
    }

    pub fn contains(&self, id: &N) -> bool {
        self.downstream.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.downstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downstream.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.downstream.values().map(BTreeSet::len).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.downstream.keys()
    }

    /// 当前调度前沿: 没有未解决入边的节点
    pub fn independent_nodes(&self) -> BTreeSet<N> {
        self.upstream
            .iter()
            .filter(|(_, preds)| preds.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// 直接后继
    pub fn downstream(&self, id: &N) -> BTreeSet<N> {
        self.downstream.get(id).cloned().unwrap_or_default()
    }

    /// 直接前驱
    pub fn upstream(&self, id: &N) -> BTreeSet<N> {
        self.upstream.get(id).cloned().unwrap_or_default()
    }

    /// 无环时返回 true
    pub fn validate(&self) -> bool {
        self.topological_sort().len() == self.len()
    }

    /// Kahn 算法拓扑排序
    ///
    /// 图中有环时结果是部分序列: 环上的节点以及它们的下游都不会出现。
    pub fn topological_sort(&self) -> Vec<N> {
        let mut in_degree: BTreeMap<&N, usize> = self
            .upstream
            .iter()
            .map(|(id, preds)| (id, preds.len()))
            .collect();

        let mut queue: VecDeque<&N> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(node) = queue.pop_front() {
            order.push(node.clone());
            if let Some(successors) = self.downstream.get(node) {
                for succ in successors {
                    if let Some(degree) = in_degree.get_mut(succ) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(succ);
                        }
                    }
                }
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn chain(ids: &[i64]) -> DependencyGraph<i64> {
        let mut graph = DependencyGraph::new();
        for id in ids {
            graph.add_node(*id);
        }
        for pair in ids.windows(2) {
            graph.add_edge(pair[0], pair[1]).unwrap();
        }
        graph
    }

    #[test]
    fn test_add_edge_requires_both_nodes() {
        let mut graph = DependencyGraph::new();
        graph.add_node(1);
        let result = graph.add_edge(1, 2);
        assert!(matches!(result, Err(SchedulerError::GraphNodeNotFound(_))));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_edges_are_ignored() {
        let mut graph = chain(&[1, 2]);
        graph.add_edge(1, 2).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_topological_sort_chain() {
        let graph = chain(&[3, 1, 2]);
        assert!(graph.validate());
        assert_eq!(graph.topological_sort(), vec![3, 1, 2]);
    }

    #[test]
    fn test_cycle_detection_leaves_members_out_of_order() {
        let mut graph = chain(&[1, 2, 3]);
        graph.add_edge(3, 2).unwrap();
        graph.add_node(10);

        assert!(!graph.validate());
        let order = graph.topological_sort();
        assert_eq!(order, vec![1, 10]);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_edge("a", "a").unwrap();
        assert!(!graph.validate());
        assert!(graph.independent_nodes().is_empty());
    }

    #[test]
    fn test_independent_nodes_follow_removal() {
        let mut graph = chain(&[1, 2, 3]);
        assert_eq!(graph.independent_nodes(), BTreeSet::from([1]));

        assert!(graph.delete_node_if_exists(&1));
        assert_eq!(graph.independent_nodes(), BTreeSet::from([2]));
        assert!(!graph.delete_node_if_exists(&1));

        assert_eq!(graph.downstream(&2), BTreeSet::from([3]));
        assert_eq!(graph.upstream(&3), BTreeSet::from([2]));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_delete_middle_node_drops_edges() {
        let mut graph = chain(&[1, 2, 3]);
        graph.delete_node_if_exists(&2);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.downstream(&1).is_empty());
        assert_eq!(graph.independent_nodes(), BTreeSet::from([1, 3]));
    }

    #[test]
    fn test_independent_nodes_match_in_degree_after_random_mutations() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut graph = DependencyGraph::new();
        let mut edges: BTreeSet<(u32, u32)> = BTreeSet::new();
        let mut nodes: BTreeSet<u32> = BTreeSet::new();

        for _ in 0..500 {
            match rng.random_range(0..3) {
                0 => {
                    let id = rng.random_range(0..20);
                    graph.add_node(id);
                    nodes.insert(id);
                }
                1 => {
                    let from = rng.random_range(0..20);
                    let to = rng.random_range(0..20);
                    if graph.add_edge(from, to).is_ok() {
                        edges.insert((from, to));
                    }
                }
                _ => {
                    let id = rng.random_range(0..20);
                    graph.delete_node_if_exists(&id);
                    nodes.remove(&id);
                    edges.retain(|(from, to)| *from != id && *to != id);
                }
            }

            let expected: BTreeSet<u32> = nodes
                .iter()
                .copied()
                .filter(|id| !edges.iter().any(|(_, to)| to == id))
                .collect();
            assert_eq!(graph.independent_nodes(), expected);
            assert_eq!(graph.edge_count(), edges.len());
        }
    }
}
