mod builtins;
mod numeric;

use crate::eval::Evaluator;

pub fn register_all(evaluator: &mut Evaluator) {
    builtins::register(evaluator);
    numeric::register(evaluator);
}
