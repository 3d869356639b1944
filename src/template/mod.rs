/// Replayable operation chains.
///
/// ```text
///   Session (compose on live data)          Template::load (.wizt)
///            │                                      │
///            └──────────────┬───────────────────────┘
///                           ▼
///                    ┌────────────┐
///                    │  Template  │  ordered steps, no data
///                    └────────────┘
///                           │  bind(namespaces, seeds)
///                           ▼
///                  ┌────────────────┐
///                  │ BoundTemplate  │  + math/dataset namespaces, ORIGINAL
///                  └────────────────┘
///                           │  replay()
///                           ▼
///                    ┌──────────┐
///                    │  Replay  │  lazy (value, name) per step
///                    └──────────┘
/// ```

pub mod namespace;
pub mod replay;
pub mod session;
pub mod step;
