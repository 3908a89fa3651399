/// Fixed month-name ↔ month-number table.
///
/// Names are stored in calendar order, so the number of a month is its
/// position + 1. The table is immutable and handed to each stage by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthTable {
    names: [&'static str; 12],
}

/// Spanish month names as they appear (after column-name cleaning) in the
/// SESNSP municipal file.
pub static SPANISH_MONTHS: MonthTable = MonthTable {
    names: [
        "enero",
        "febrero",
        "marzo",
        "abril",
        "mayo",
        "junio",
        "julio",
        "agosto",
        "septiembre",
        "octubre",
        "noviembre",
        "diciembre",
    ],
};

impl MonthTable {
    /// Month names in calendar order.
    pub fn names(&self) -> &[&'static str; 12] {
        &self.names
    }

    /// 1-based month number for `name`, or `None` if the name is not one of the twelve.
    pub fn number(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .position(|m| *m == name)
            .map(|idx| idx as u32 + 1)
    }
}
