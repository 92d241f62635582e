#[cfg(test)]
mod strategies_tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::strategies::*;
    use dagsched_core::models::{Task, WorkerInfo, WorkerStatus};
    use dagsched_core::traits::WorkerSelectionStrategy;

    fn create_test_task() -> Task {
        let mut task = Task::new(7, 1, Utc::now(), 300);
        task.id = 1;
        task
    }

    fn create_test_worker(id: &str, current_tasks: i32, max_tasks: i32) -> WorkerInfo {
        let mut worker = WorkerInfo::new(id, "default", max_tasks);
        worker.current_task_count = current_tasks;
        worker
    }

    struct NeverStrategy;

    #[async_trait]
    impl WorkerSelectionStrategy for NeverStrategy {
        async fn choose(&self, _task: &Task, _workers: &[WorkerInfo]) -> Option<String> {
            None
        }

        fn name(&self) -> &str {
            "Never"
        }
    }

    #[tokio::test]
    async fn test_round_robin_strategy() {
        let strategy = RoundRobinStrategy::new();
        let task = create_test_task();

        let workers = vec![
            create_test_worker("worker1", 0, 5),
            create_test_worker("worker2", 1, 5),
            create_test_worker("worker3", 2, 5),
        ];

        let selected1 = strategy.choose(&task, &workers).await;
        let selected2 = strategy.choose(&task, &workers).await;
        let selected3 = strategy.choose(&task, &workers).await;
        let selected4 = strategy.choose(&task, &workers).await;

        assert!(selected1.is_some());
        assert_ne!(selected1, selected2);
        assert_ne!(selected2, selected3);

        // 第四次选择回到第一个Worker
        assert_eq!(selected1, selected4);
    }

    #[tokio::test]
    async fn test_round_robin_strategy_no_workers() {
        let strategy = RoundRobinStrategy::new();
        let task = create_test_task();

        assert!(strategy.choose(&task, &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_round_robin_skips_down_and_full_workers() {
        let strategy = RoundRobinStrategy::new();
        let task = create_test_task();

        let mut down = create_test_worker("worker1", 0, 5);
        down.status = WorkerStatus::Down;
        let workers = vec![down, create_test_worker("worker2", 5, 5), create_test_worker("worker3", 0, 5)];

        for _ in 0..3 {
            assert_eq!(strategy.choose(&task, &workers).await, Some("worker3".to_string()));
        }
    }

    #[tokio::test]
    async fn test_least_loaded_strategy() {
        let strategy = LeastLoadedStrategy::new();
        let task = create_test_task();

        let workers = vec![
            create_test_worker("worker1", 4, 5), // 80% 负载
            create_test_worker("worker2", 1, 5), // 20% 负载
            create_test_worker("worker3", 3, 5), // 60% 负载
        ];

        let selected = strategy.choose(&task, &workers).await;
        assert_eq!(selected, Some("worker2".to_string()));
    }

    #[tokio::test]
    async fn test_least_loaded_strategy_full_workers() {
        let strategy = LeastLoadedStrategy::new();
        let task = create_test_task();

        let workers = vec![
            create_test_worker("worker1", 5, 5),
            create_test_worker("worker2", 5, 5),
        ];

        assert!(strategy.choose(&task, &workers).await.is_none());
    }

    #[tokio::test]
    async fn test_random_strategy_picks_a_candidate() {
        let strategy = RandomStrategy::new();
        let task = create_test_task();

        let workers = vec![
            create_test_worker("worker1", 0, 5),
            create_test_worker("worker2", 5, 5),
            create_test_worker("worker3", 0, 5),
        ];

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let selected = strategy.choose(&task, &workers).await.unwrap();
            assert_ne!(selected, "worker2");
            seen.insert(selected);
        }
        assert!(seen.len() <= 2);
        assert!(strategy.choose(&task, &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_composite_strategy_fallback() {
        let mut composite = CompositeStrategy::new(vec![Arc::new(NeverStrategy)]);
        composite.add_strategy(Arc::new(LeastLoadedStrategy::new()));

        let task = create_test_task();
        let workers = vec![
            create_test_worker("worker1", 3, 5),
            create_test_worker("worker2", 1, 5),
        ];

        let selected = composite.choose(&task, &workers).await;
        assert_eq!(selected, Some("worker2".to_string()));
    }

    #[tokio::test]
    async fn test_composite_strategy_none() {
        let strategies: Vec<Arc<dyn WorkerSelectionStrategy>> =
            vec![Arc::new(NeverStrategy), Arc::new(RoundRobinStrategy::new())];
        let composite = CompositeStrategy::new(strategies);

        let task = create_test_task();
        let workers = vec![create_test_worker("worker1", 5, 5)];

        assert!(composite.choose(&task, &workers).await.is_none());
    }

    #[tokio::test]
    async fn test_strategy_from_name() {
        assert_eq!(strategy_from_name("round_robin").unwrap().name(), "RoundRobin");
        assert_eq!(strategy_from_name("least_loaded").unwrap().name(), "LeastLoaded");
        assert_eq!(strategy_from_name("random").unwrap().name(), "Random");
        assert!(strategy_from_name("task_type_affinity").is_err());
    }

    #[tokio::test]
    async fn test_composite_strategy_from_name() {
        let strategy = strategy_from_name("composite:least_loaded, random").unwrap();
        assert_eq!(strategy.name(), "Composite");

        let task = create_test_task();
        let workers = vec![
            create_test_worker("worker1", 4, 5),
            create_test_worker("worker2", 2, 5),
        ];
        assert_eq!(
            strategy.choose(&task, &workers).await,
            Some("worker2".to_string())
        );

        assert!(strategy_from_name("composite:").is_err());
        assert!(strategy_from_name("composite:least_loaded,,random").is_err());
        assert!(strategy_from_name("composite:least_loaded,fastest").is_err());
        assert!(strategy_from_name("composite:composite:random").is_err());
    }

    #[tokio::test]
    async fn test_strategy_names() {
        assert_eq!(RoundRobinStrategy::new().name(), "RoundRobin");
        assert_eq!(LeastLoadedStrategy::new().name(), "LeastLoaded");
        assert_eq!(RandomStrategy::new().name(), "Random");
        assert_eq!(CompositeStrategy::new(vec![]).name(), "Composite");
    }
}
