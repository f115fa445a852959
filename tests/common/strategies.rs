use proptest::prelude::*;

/// Any well-formed error code, `E1000` through `E5999`
pub fn error_code_strategy() -> impl Strategy<Value = String> {
    (1u16..=5, 0u16..1000).prop_map(|(category, rest)| format!("E{}", category * 1000 + rest))
}

/// Codes inside the model-output range
pub fn model_output_code_strategy() -> impl Strategy<Value = String> {
    (2300u16..=2399).prop_map(|n| format!("E{n}"))
}

/// One queue operation against a small pool of entities
#[derive(Debug, Clone)]
pub enum QueueOp {
    Enqueue { node: usize, category: Option<usize> },
    Cancel { node: usize },
    Tick,
    Release,
}

pub const NODE_POOL: usize = 4;

pub fn queue_op_strategy() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        4 => (0..NODE_POOL, proptest::option::of(0usize..2))
            .prop_map(|(node, category)| QueueOp::Enqueue { node, category }),
        2 => (0..NODE_POOL).prop_map(|node| QueueOp::Cancel { node }),
        3 => Just(QueueOp::Tick),
        1 => Just(QueueOp::Release),
    ]
}

pub fn queue_ops_strategy() -> impl Strategy<Value = Vec<QueueOp>> {
    prop::collection::vec(queue_op_strategy(), 1..40)
}

/// Names with a mix of ordinary and filesystem-hostile characters
pub fn note_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ./\\\\:*?\"<>|#\\-]{0,40}"
}
