//! Task dependency graph construction, validation and batching.
//!
//! ```text
//! Vec<Task> + explicit dependency map
//!   ↓
//! TaskGraph::from_tasks()      duplicate ids, unknown dependencies
//!   ↓
//! TaskGraph::batches()         level-by-level partition, cycle detection
//!   ↓
//! ExecutionPlan { tasks, dependency_map, batches }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;

use crate::error::GraphError;
use crate::types::Task;

/// Default per-task duration used for plan estimates.
pub const DEFAULT_TASK_ESTIMATE: Duration = Duration::from_secs(30);

/// Validate `tasks` plus `explicit_dependencies` and partition them into batches.
pub fn build_plan(
    tasks: Vec<Task>,
    explicit_dependencies: &HashMap<String, Vec<String>>,
) -> Result<ExecutionPlan, GraphError> {
    TaskGraph::from_tasks(tasks, explicit_dependencies)?.into_plan()
}

/// Task dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Tasks in input order, dependencies merged and deduplicated
    tasks: Vec<Task>,

    /// task_id -> position in `tasks`
    index: HashMap<String, usize>,

    /// Reverse edges: task_id -> tasks that depend on it
    reverse_edges: HashMap<String, Vec<String>>,
}

impl TaskGraph {
    /// Construct the graph, merging each task's own dependency list with the
    /// explicit map and rejecting duplicate ids and dangling references.
    pub fn from_tasks(
        mut tasks: Vec<Task>,
        explicit_dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (pos, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), pos).is_some() {
                return Err(GraphError::DuplicateTaskId(task.id.clone()));
            }
        }

        // Explicit entries must point at tasks in this plan too.
        let mut explicit_keys: Vec<_> = explicit_dependencies.keys().collect();
        explicit_keys.sort();
        for task_id in explicit_keys {
            if !index.contains_key(task_id) {
                return Err(GraphError::UnknownDependency {
                    task_id: task_id.clone(),
                    missing_dep: task_id.clone(),
                });
            }
        }

        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();

        for task in &mut tasks {
            let extra = explicit_dependencies
                .get(&task.id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let mut seen = HashSet::new();
            let merged: Vec<String> = task
                .dependencies
                .iter()
                .chain(extra.iter())
                .filter(|dep| seen.insert(dep.as_str()))
                .cloned()
                .collect();

            for dep in &merged {
                if !index.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task_id: task.id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
                reverse_edges
                    .entry(dep.clone())
                    .or_default()
                    .push(task.id.clone());
            }

            task.dependencies = merged;
        }

        Ok(Self {
            tasks,
            index,
            reverse_edges,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    /// Partition into topological levels.
    ///
    /// Batch *k* holds exactly the tasks whose dependencies all sit in batches
    /// `0..k`. Tasks keep their input order within a batch. If a level comes up
    /// empty while tasks remain, the leftovers form at least one cycle.
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn batches(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = self
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.dependencies.len()))
            .collect();

        let mut current: Vec<&str> = self
            .tasks
            .iter()
            .filter(|t| t.dependencies.is_empty())
            .map(|t| t.id.as_str())
            .collect();

        let mut batches: Vec<Vec<String>> = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();

            for id in &current {
                let Some(dependents) = self.reverse_edges.get(*id) else {
                    continue;
                };
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.as_str());
                        }
                    }
                }
            }

            // Preserve input order
            next.sort_by_key(|id| self.index.get(*id).copied().unwrap_or(usize::MAX));

            batches.push(current.iter().map(|id| id.to_string()).collect());
            current = next;
        }

        if placed != self.tasks.len() {
            let cycle = self
                .detect_cycle()
                .unwrap_or_else(|| "unable to partition remaining tasks".to_string());
            return Err(GraphError::CyclicDependency(cycle));
        }

        Ok(batches)
    }

    /// Validate and freeze into an `ExecutionPlan`.
    pub fn into_plan(self) -> Result<ExecutionPlan, GraphError> {
        let batches = self.batches()?;
        let dependency_map = self
            .tasks
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect();

        Ok(ExecutionPlan {
            tasks: self.tasks,
            index: self.index,
            dependency_map,
            batches,
        })
    }

    /// Find one cycle with DFS and render it as `a -> b -> a`.
    fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task in &self.tasks {
            if !visited.contains(task.id.as_str())
                && self.dfs_cycle(&task.id, &mut visited, &mut stack)
            {
                return Some(stack.join(" -> "));
            }
        }

        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> bool {
        visited.insert(node);
        stack.push(node);

        if let Some(task) = self.task(node) {
            for dep in &task.dependencies {
                if let Some(pos) = stack.iter().position(|x| *x == dep.as_str()) {
                    stack.push(dep.as_str());
                    stack.drain(..pos);
                    return true;
                }

                if !visited.contains(dep.as_str()) && self.dfs_cycle(dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }
}

/// A validated, batch-partitioned set of tasks.
///
/// Only obtainable through [`build_plan`] / [`TaskGraph::into_plan`], so every
/// instance satisfies the batching invariants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    tasks: Vec<Task>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    dependency_map: BTreeMap<String, Vec<String>>,
    batches: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    pub fn dependency_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.dependency_map
    }

    pub fn dependencies(&self, id: &str) -> &[String] {
        self.dependency_map
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn batches(&self) -> &[Vec<String>] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Distinct agent types referenced by the plan, in first-use order.
    pub fn agent_types(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tasks
            .iter()
            .map(|t| t.agent_type.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Rough wall-clock estimate: `ceil(n * per_task / min(n, max_concurrent))`.
    pub fn estimated_duration(&self, max_concurrent: usize, per_task: Duration) -> Duration {
        let n = self.tasks.len() as u128;
        if n == 0 {
            return Duration::ZERO;
        }
        let parallel = n.min(max_concurrent.max(1) as u128);
        let total = n * per_task.as_millis();
        Duration::from_millis(total.div_ceil(parallel) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task::new(id, "echo", id).with_dependencies(deps.iter().copied())
    }

    fn no_explicit() -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    #[test]
    fn diamond_batches() {
        let plan = build_plan(
            vec![
                task("A", &[]),
                task("B", &["A"]),
                task("C", &["A"]),
                task("D", &["B", "C"]),
            ],
            &no_explicit(),
        )
        .unwrap();

        assert_eq!(
            plan.batches(),
            &[
                vec!["A".to_string()],
                vec!["B".to_string(), "C".to_string()],
                vec!["D".to_string()],
            ]
        );
        assert_eq!(plan.dependencies("D"), &["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn batches_keep_input_order() {
        let plan = build_plan(
            vec![task("z", &[]), task("m", &[]), task("a", &["z"]), task("b", &["m"])],
            &no_explicit(),
        )
        .unwrap();
        assert_eq!(plan.batches()[0], vec!["z", "m"]);
        assert_eq!(plan.batches()[1], vec!["a", "b"]);
    }

    #[test]
    fn explicit_dependencies_are_merged() {
        let mut explicit = HashMap::new();
        explicit.insert("b".to_string(), vec!["a".to_string(), "a".to_string()]);
        let plan = build_plan(vec![task("a", &[]), task("b", &[])], &explicit).unwrap();
        assert_eq!(plan.batches().len(), 2);
        assert_eq!(plan.dependencies("b"), &["a".to_string()]);
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = build_plan(vec![task("a", &["ghost"])], &no_explicit()).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                task_id: "a".into(),
                missing_dep: "ghost".into(),
            }
        );
    }

    #[test]
    fn rejects_explicit_entry_for_unknown_task() {
        let mut explicit = HashMap::new();
        explicit.insert("ghost".to_string(), vec![]);
        let err = build_plan(vec![task("a", &[])], &explicit).unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { .. }));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = build_plan(vec![task("a", &[]), task("a", &[])], &no_explicit()).unwrap_err();
        assert_eq!(err, GraphError::DuplicateTaskId("a".into()));
    }

    #[test]
    fn reports_cycle_path() {
        let err = build_plan(
            vec![task("root", &[]), task("a", &["c"]), task("b", &["a"]), task("c", &["b"])],
            &no_explicit(),
        )
        .unwrap_err();
        let GraphError::CyclicDependency(path) = err else {
            panic!("expected cycle, got {err:?}");
        };
        let nodes: Vec<&str> = path.split(" -> ").collect();
        assert_eq!(nodes.first(), nodes.last());
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = build_plan(vec![task("a", &["a"])], &no_explicit()).unwrap_err();
        assert_eq!(err, GraphError::CyclicDependency("a -> a".into()));
    }

    #[test]
    fn empty_plan_has_no_batches() {
        let plan = build_plan(Vec::new(), &no_explicit()).unwrap();
        assert!(plan.is_empty());
        assert!(plan.batches().is_empty());
        assert_eq!(plan.estimated_duration(5, DEFAULT_TASK_ESTIMATE), Duration::ZERO);
    }

    #[test]
    fn estimate_accounts_for_parallelism() {
        let tasks = (0..10).map(|i| task(&format!("t{i}"), &[])).collect();
        let plan = build_plan(tasks, &no_explicit()).unwrap();
        assert_eq!(
            plan.estimated_duration(3, Duration::from_secs(30)),
            Duration::from_secs(100)
        );
        assert_eq!(
            plan.estimated_duration(50, Duration::from_secs(30)),
            Duration::from_secs(30)
        );
    }

    /// Random DAGs: each task may only depend on tasks with a lower index.
    fn arb_dag() -> impl Strategy<Value = Vec<Task>> {
        (1usize..24).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..4), n)
                .prop_map(move |picks| {
                    picks
                        .into_iter()
                        .enumerate()
                        .map(|(i, deps)| {
                            let deps: Vec<String> = if i == 0 {
                                Vec::new()
                            } else {
                                deps.iter().map(|d| format!("t{}", d.index(i))).collect()
                            };
                            Task::new(format!("t{i}"), "echo", "").with_dependencies(deps)
                        })
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn batches_partition_acyclic_graphs(tasks in arb_dag()) {
            let ids: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
            let plan = build_plan(tasks, &HashMap::new()).unwrap();

            let mut level: HashMap<&str, usize> = HashMap::new();
            for (k, batch) in plan.batches().iter().enumerate() {
                for id in batch {
                    prop_assert!(level.insert(id.as_str(), k).is_none(), "{} placed twice", id);
                }
            }
            prop_assert_eq!(level.len(), ids.len());

            for (k, batch) in plan.batches().iter().enumerate() {
                for id in batch {
                    for dep in plan.dependencies(id) {
                        prop_assert!(level[dep.as_str()] < k);
                    }
                    if k == 0 {
                        prop_assert!(plan.dependencies(id).is_empty());
                    }
                }
            }
        }

        #[test]
        fn back_edge_always_rejected(tasks in arb_dag()) {
            // t0 -> last -> t0
            let n = tasks.len();
            prop_assume!(n >= 2);
            let mut tasks = tasks;
            let last = tasks[n - 1].id.clone();
            tasks[n - 1].dependencies = vec!["t0".to_string()];
            tasks[0].dependencies = vec![last];
            let result = build_plan(tasks, &HashMap::new());
            prop_assert!(
                matches!(result, Err(GraphError::CyclicDependency(_))),
                "expected a cycle error, got {:?}",
                result
            );
        }
    }
}
