//! Bounded concurrent execution of plugin invocations
//!
//! This module only manages **resources** and **execution strategy**; it
//! knows nothing about files, plugins or verdicts.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   Client        │    │   Parallel       │    │   System        │
//! │   (Gate)        │───▶│   Module         │───▶│   Resources     │
//! │                 │    │                  │    │                 │
//! │ • (file,plugin) │    │ • CPU cores      │    │ • Hardware      │
//! │   work items    │    │ • Worker limit   │    │ • Child procs   │
//! │ • Verdicts      │    │ • Ordering       │    │                 │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! Results always come back in work-item order, whatever order the workers
//! finished in. An interrupt stops new items from starting; items that never
//! started come back as `None`.
//!
//! # Example
//!
//! ```rust
//! use stagegate::parallel::ExecutionStrategy;
//!
//! let workers = ExecutionStrategy::calculate_optimal_workers(0, 75);
//! assert!(workers >= 1);
//!
//! let strategy = ExecutionStrategy::auto(10, workers);
//! assert!(strategy.workers() >= 1);
//!
//! assert!(matches!(ExecutionStrategy::auto(10, 1), ExecutionStrategy::Sequential));
//! ```

pub mod core;

pub use self::core::ExecutionStrategy;
