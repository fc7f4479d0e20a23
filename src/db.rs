pub mod backups;
