/// A billable-hours record from the FileMaker timesheet layout.
///
/// Read-only in this app except for the billed flag, which the billing run
/// flips once the entry has been invoiced.
#[derive(Debug, Clone)]
pub struct TimeEntry {
    pub id: String,
    pub customer_id: String,
    pub project_id: String,
    pub hours: f64,
    pub rate: f64,
    pub amount: f64,
    pub date: Option<chrono::NaiveDate>,
    pub billed: bool,
    pub description: String,
}
