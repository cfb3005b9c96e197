mod health_records;
mod users;
