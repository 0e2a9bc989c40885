use super::{interface, EntryPoint, IrqLine};

pub struct NullLineController;

pub static NULL_LINE_CONTROLLER: NullLineController = NullLineController {};

impl interface::LineController for NullLineController {
    fn compatible(&self) -> &'static str {
        "null line controller"
    }

    fn bind_line(&self, _line: IrqLine, _entry: EntryPoint) -> Result<(), &'static str> {
        Err("no line controller registered")
    }

    fn unbind_line(&self, _line: IrqLine, _entry: EntryPoint) -> Result<(), &'static str> {
        Err("no line controller registered")
    }
}
