pub mod storage_readers;
