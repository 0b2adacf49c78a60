//! Display names for queues, derived from the billing client record.

use crate::model::{ClientInfo, ClientType};

/// `"<first> <last> - Service ID:<id>"` for individuals,
/// `"<company> - Service ID: <id>"` for organizations, and
/// `"Service ID: <id>"` otherwise.
pub fn queue_name(client: &ClientInfo, service_id: u64) -> String {
    match client.client_type {
        ClientType::Individual => format!(
            "{} {} - Service ID:{service_id}",
            client.first_name, client.last_name
        ),
        ClientType::Organization => {
            format!("{} - Service ID: {service_id}", client.company_name)
        }
        ClientType::Other => format!("Service ID: {service_id}"),
    }
}
