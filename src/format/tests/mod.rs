mod tests_statistics;
mod tests_summary;
