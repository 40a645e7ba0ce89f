mod control;
mod groups;
mod introspection;
mod iterators;
mod math;
mod types;

use larch_core::NativeFunction;

use crate::eval::Evaluator;

pub fn register(evaluator: &mut Evaluator) {
    evaluator.register_native(NativeFunction::new("print", control::print));
    evaluator.register_native(NativeFunction::new("eval", control::eval));
    evaluator.register_native(
        NativeFunction::new("run", control::run).with_doc("run(filename): execute a script file"),
    );

    evaluator.register_native(NativeFunction::pure("str", types::to_str));
    evaluator.register_native(NativeFunction::pure("int", types::to_int));
    evaluator.register_native(NativeFunction::pure("float", types::to_float));
    evaluator.register_native(NativeFunction::pure("bool", types::to_bool));
    evaluator.register_native(NativeFunction::pure("list", types::to_list));
    evaluator.register_native(NativeFunction::pure("tuple", types::to_tuple));
    evaluator.register_native(NativeFunction::pure("dict", types::to_dict));
    evaluator.register_native(NativeFunction::pure("type", types::type_of));
    evaluator.register_native(NativeFunction::pure("repr", types::repr));

    evaluator.register_native(NativeFunction::pure("len", iterators::len));
    evaluator.register_native(NativeFunction::pure("range", iterators::range));
    evaluator.register_native(NativeFunction::pure("enumerate", iterators::enumerate));
    evaluator.register_native(NativeFunction::pure("zip", iterators::zip));
    evaluator.register_native(NativeFunction::pure("sorted", iterators::sorted));
    evaluator.register_native(NativeFunction::pure("reversed", iterators::reversed));

    evaluator.register_native(NativeFunction::pure("min", math::min));
    evaluator.register_native(NativeFunction::pure("max", math::max));
    evaluator.register_native(NativeFunction::pure("sum", math::sum));
    evaluator.register_native(NativeFunction::pure("abs", math::abs));
    evaluator.register_native(NativeFunction::pure("round", math::round));

    evaluator.register_native(
        NativeFunction::new("dir", introspection::dir).with_doc("dir(group=None): list symbol names"),
    );
    evaluator.register_native(
        NativeFunction::new("show", introspection::show).with_doc("show(obj=None): display a group or value"),
    );
    evaluator.register_native(
        NativeFunction::new("which", introspection::which)
            .with_doc("which(name): full path of a symbol, or None"),
    );
    evaluator.register_native(NativeFunction::new("exists", introspection::exists));
    evaluator.register_native(NativeFunction::new("isgroup", introspection::isgroup));
    evaluator.register_native(
        NativeFunction::new("help", introspection::help).with_doc("help(obj): show documentation"),
    );

    evaluator.register_native(
        NativeFunction::pure("group", groups::group).with_doc("group(**kws): new group holding kws"),
    );
    evaluator.register_native(
        NativeFunction::new("newgroup", groups::newgroup)
            .with_doc("newgroup(name, **kws): create a named group in the current group"),
    );
    evaluator.register_native(NativeFunction::pure("subgroups", groups::subgroups));
    evaluator.register_native(NativeFunction::pure("group_items", groups::group_items));
    evaluator.register_native(NativeFunction::new("set_datagroup", groups::set_datagroup));
    evaluator.register_native(NativeFunction::new("set_funcgroup", groups::set_funcgroup));
}
