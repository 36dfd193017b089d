mod customer;
mod qbo_customer;
mod qbo_invoice;
mod sale_line;
mod time_entry;

pub use customer::Customer;
pub use qbo_customer::{EmailAddr, QboCustomer};
pub use qbo_invoice::{QboInvoice, QboInvoiceLine, QboInvoicePayload, Ref, SalesItemLineDetail};
pub use sale_line::SaleLine;
pub use time_entry::TimeEntry;
