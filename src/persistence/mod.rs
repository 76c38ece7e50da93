pub mod csv_writer;
pub mod writer_task;

pub use csv_writer::CsvRecordWriter;
pub use writer_task::spawn_record_writer;
